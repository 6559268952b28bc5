//! Value assignments detached from any particular graph.
//!
//! Refinement works with facts of the form "bytes `[offset, offset + size)`
//! of variable `v` hold the constant `c`". [`SmgInformation`] collects such
//! facts from a configuration and replays them into another one.

use im::OrdMap;
use num_bigint::BigInt;

use crate::error::Result;
use crate::spc::{SymbolicProgramConfiguration, Variable};

/// A variable-relative memory location.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryLocation {
    pub variable: Variable,
    pub offset: u64,
}

impl MemoryLocation {
    pub fn new(variable: Variable, offset: u64) -> Self {
        Self { variable, offset }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ValueAndSize {
    pub value: BigInt,
    pub size: u64,
}

impl ValueAndSize {
    pub fn new(value: impl Into<BigInt>, size: u64) -> Self {
        Self {
            value: value.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct SmgInformation {
    assignments: OrdMap<MemoryLocation, ValueAndSize>,
}

impl SmgInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, location: MemoryLocation, value: ValueAndSize) -> Self {
        Self {
            assignments: self.assignments.update(location, value),
        }
    }

    pub fn remove(&self, location: &MemoryLocation) -> Self {
        Self {
            assignments: self.assignments.without(location),
        }
    }

    pub fn get(&self, location: &MemoryLocation) -> Option<&ValueAndSize> {
        self.assignments.get(location)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemoryLocation, &ValueAndSize)> + '_ {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Every explicit scalar held directly by a variable.
    ///
    /// Addresses are skipped, except for the null pointer, which is the
    /// constant 0.
    pub fn from_configuration(spc: &SymbolicProgramConfiguration) -> Self {
        let smg = spc.smg();
        let mut assignments = OrdMap::new();
        for (variable, object) in spc.variables() {
            if !smg.is_valid(object) {
                continue;
            }
            for e in smg.has_value_edges(object) {
                if smg.is_address(e.value) && !e.value.is_zero() {
                    continue;
                }
                if let Some(c) = smg.value(e.value).and_then(|v| v.as_explicit()) {
                    assignments.insert(
                        MemoryLocation::new(variable.clone(), e.offset),
                        ValueAndSize::new(c.clone(), e.size),
                    );
                }
            }
        }
        Self { assignments }
    }

    /// Write every assignment into `spc`.
    pub fn apply_to(&self, spc: &SymbolicProgramConfiguration) -> Result<SymbolicProgramConfiguration> {
        let mut spc = spc.clone();
        for (location, value) in self.assignments.iter() {
            spc = spc.write_explicit(&location.variable, location.offset, value.size, value.value.clone())?;
        }
        Ok(spc)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::SmgError;
    use crate::types::ValueId;
    use crate::value::SymbolicValue;

    #[test]
    fn test_persistence() {
        let loc = MemoryLocation::new(Variable::global("x"), 0);
        let empty = SmgInformation::new();
        let one = empty.assign(loc.clone(), ValueAndSize::new(5, 4));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(one.get(&loc), Some(&ValueAndSize::new(5, 4)));
        assert_eq!(one.remove(&loc), empty);
    }

    #[test]
    fn test_round_trip_through_configuration() {
        let x = Variable::global("x");
        let p = Variable::local("main", "p");
        let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(x.clone(), 8);
        let (spc, _) = spc.declare_variable(p.clone(), 8);
        let fresh = spc.clone();

        let spc = spc.write_explicit(&x, 0, 4, 17).unwrap();
        let spc = spc.write_variable(&p, 0, 8, ValueId::ZERO).unwrap();
        let info = SmgInformation::from_configuration(&spc);
        assert_eq!(info.len(), 2);
        assert_eq!(info.get(&MemoryLocation::new(x.clone(), 0)), Some(&ValueAndSize::new(17, 4)));
        assert_eq!(info.get(&MemoryLocation::new(p.clone(), 0)), Some(&ValueAndSize::new(0, 8)));

        let replayed = info.apply_to(&fresh).unwrap();
        let v = replayed.read_variable(&x, 0, 4).unwrap().unwrap();
        assert_eq!(replayed.smg().value(v), Some(&SymbolicValue::explicit(17)));
    }

    #[test]
    fn test_apply_to_unknown_variable() {
        let info = SmgInformation::new().assign(MemoryLocation::new(Variable::global("z"), 0), ValueAndSize::new(1, 4));
        assert!(matches!(
            info.apply_to(&SymbolicProgramConfiguration::new()),
            Err(SmgError::UnknownVariable(_))
        ));
    }
}
