use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::abstraction::{abstract_lists, AbstractionOptions};
use crate::error::Result;
use crate::interrupt::InterruptFlag;
use crate::spc::SymbolicProgramConfiguration;

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a state, unique within the process.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StateId(u64);

impl StateId {
    fn fresh() -> Self {
        StateId(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl Display for StateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Analysis-wide options consulted at every program point.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SmgPrecision {
    /// Merge only pairs of states that are both at a block end.
    pub merge_at_block_end_only: bool,
    pub abstraction: AbstractionOptions,
}

impl Default for SmgPrecision {
    fn default() -> Self {
        Self {
            merge_at_block_end_only: false,
            abstraction: AbstractionOptions::default(),
        }
    }
}

impl SmgPrecision {
    /// Whether lists are folded at a point with the given block-end flag.
    pub fn should_abstract(&self, block_end: bool) -> bool {
        self.abstraction.enabled && block_end
    }

    /// Whether the merge operator may combine these two states.
    pub fn merge_allowed(&self, new: &SmgState, reached: &SmgState) -> bool {
        !self.merge_at_block_end_only || (new.block_end() && reached.block_end())
    }
}

/// One abstract state of the analysis.
///
/// Equality and hashing look at the configuration and the block-end flag
/// only; the id merely names the state in logs and subsumption records.
#[derive(Debug, Clone)]
pub struct SmgState {
    id: StateId,
    configuration: SymbolicProgramConfiguration,
    block_end: bool,
}

impl SmgState {
    pub fn new(configuration: SymbolicProgramConfiguration) -> Self {
        Self {
            id: StateId::fresh(),
            configuration,
            block_end: false,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn configuration(&self) -> &SymbolicProgramConfiguration {
        &self.configuration
    }

    pub fn block_end(&self) -> bool {
        self.block_end
    }

    pub fn with_block_end(&self, block_end: bool) -> Self {
        Self {
            id: StateId::fresh(),
            configuration: self.configuration.clone(),
            block_end,
        }
    }

    /// A successor state with the same block-end flag.
    pub fn with_configuration(&self, configuration: SymbolicProgramConfiguration) -> Self {
        Self {
            id: StateId::fresh(),
            configuration,
            block_end: self.block_end,
        }
    }

    pub fn has_abstracted_objects(&self) -> bool {
        self.configuration.smg().has_abstracted_objects()
    }

    /// Fold lists if the precision asks for it at this point.
    pub fn abstract_if_needed(&self, precision: &SmgPrecision, interrupt: &InterruptFlag) -> Result<SmgState> {
        if !precision.should_abstract(self.block_end) {
            return Ok(self.clone());
        }
        let smg = self.configuration.smg();
        let abstracted = abstract_lists(smg, &self.configuration.root_objects(), &precision.abstraction, interrupt)?;
        if &abstracted == smg {
            return Ok(self.clone());
        }
        let state = self.with_configuration(self.configuration.with_smg(abstracted));
        debug!("abstracted {} into {}", self.id, state.id);
        Ok(state)
    }
}

impl PartialEq for SmgState {
    fn eq(&self, other: &Self) -> bool {
        self.block_end == other.block_end && self.configuration == other.configuration
    }
}

impl Eq for SmgState {}

impl Hash for SmgState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.configuration.hash(state);
        self.block_end.hash(state);
    }
}

impl Display for SmgState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} objects{})",
            self.id,
            self.configuration.smg().object_count(),
            if self.block_end { ", block end" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::edge::TargetSpecifier;
    use crate::object::SmgObject;
    use crate::spc::Variable;
    use crate::types::ValueId;

    fn list_state(len: usize) -> SmgState {
        let x = Variable::global("x");
        let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(x.clone(), 8);
        let mut smg = spc.smg().clone();
        let mut next = ValueId::ZERO;
        for _ in 0..len {
            let (s, n) = smg.add_object(SmgObject::region(16));
            let s = s.write_value(n, 8, 8, next).unwrap();
            let (s, a) = s.address_of(n, 0, TargetSpecifier::Region).unwrap();
            smg = s;
            next = a;
        }
        SmgState::new(spc.with_smg(smg).write_variable(&x, 0, 8, next).unwrap())
    }

    #[test]
    fn test_ids_are_unique_but_ignored_by_eq() {
        let a = list_state(1);
        let b = a.with_configuration(a.configuration().clone());
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_ne!(a, a.with_block_end(true));
    }

    #[test]
    fn test_abstract_only_at_block_end() {
        let precision = SmgPrecision::default();
        let flag = InterruptFlag::new();
        let state = list_state(3);

        let same = state.abstract_if_needed(&precision, &flag).unwrap();
        assert_eq!(same.id(), state.id());
        assert!(!same.has_abstracted_objects());

        let at_end = state.with_block_end(true);
        let abstracted = at_end.abstract_if_needed(&precision, &flag).unwrap();
        assert!(abstracted.has_abstracted_objects());
        assert!(abstracted.block_end());
    }

    #[test]
    fn test_merge_allowed() {
        let a = list_state(1);
        let b = a.with_block_end(true);
        let lax = SmgPrecision::default();
        assert!(lax.merge_allowed(&a, &b));
        let strict = SmgPrecision {
            merge_at_block_end_only: true,
            ..SmgPrecision::default()
        };
        assert!(!strict.merge_allowed(&a, &b));
        assert!(strict.merge_allowed(&b, &b));
    }
}
