//! Symbolic program configurations.
//!
//! A [`SymbolicProgramConfiguration`] is one complete abstract machine
//! state: an [`Smg`] plus the mapping from program variables to the objects
//! holding their values. Both parts are persistent, so deriving the
//! configuration of a successor state shares everything the program step did
//! not touch.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use im::OrdMap;
use log::debug;
use num_bigint::BigInt;

use crate::edge::TargetSpecifier;
use crate::error::{Result, SmgError};
use crate::object::{MemoryObject, SmgObject};
use crate::smg::Smg;
use crate::types::{ObjectId, ValueId};

/// Where a variable lives.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Scope {
    Global,
    /// A local of the named function.
    Function(Arc<str>),
}

/// A program variable, identified by name and scope.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Variable {
    pub name: Arc<str>,
    pub scope: Scope,
}

impl Variable {
    pub fn global(name: &str) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
        }
    }

    pub fn local(function: &str, name: &str) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Function(function.into()),
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    pub fn is_local_of(&self, function: &str) -> bool {
        matches!(&self.scope, Scope::Function(f) if &**f == function)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Scope::Global => write!(f, "{}", self.name),
            Scope::Function(function) => write!(f, "{}::{}", function, self.name),
        }
    }
}

/// An SMG together with the objects of all variables in scope.
///
/// Two configurations are equal when their graphs and variable mappings are
/// equal, so configurations can serve as map or set keys.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct SymbolicProgramConfiguration {
    smg: Smg,
    variables: OrdMap<Variable, ObjectId>,
}

impl SymbolicProgramConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(smg: Smg, variables: OrdMap<Variable, ObjectId>) -> Self {
        Self { smg, variables }
    }

    pub fn smg(&self) -> &Smg {
        &self.smg
    }

    /// The same variables over a different graph.
    pub fn with_smg(&self, smg: Smg) -> Self {
        Self {
            smg,
            variables: self.variables.clone(),
        }
    }

    /// All variables with their objects, in variable order.
    pub fn variables(&self) -> impl Iterator<Item = (&Variable, ObjectId)> + '_ {
        self.variables.iter().map(|(v, o)| (v, *o))
    }

    pub fn is_declared(&self, variable: &Variable) -> bool {
        self.variables.contains_key(variable)
    }

    pub fn object_of(&self, variable: &Variable) -> Result<ObjectId> {
        self.variables
            .get(variable)
            .copied()
            .ok_or_else(|| SmgError::UnknownVariable(variable.to_string()))
    }

    /// Objects of all variables; these anchor every traversal.
    pub fn root_objects(&self) -> BTreeSet<ObjectId> {
        self.variables.values().copied().collect()
    }

    /// Allocate an uninitialized object of `size` bytes for `variable`.
    ///
    /// Redeclaring a variable binds it to a fresh object; the previous one
    /// stays in the graph until its scope is exited.
    pub fn declare_variable(&self, variable: Variable, size: u64) -> (Self, ObjectId) {
        let (smg, object) = self.smg.add_object(SmgObject::region(size));
        debug!("declare {} as {} ({} bytes)", variable, object, size);
        let mut variables = self.variables.clone();
        variables.insert(variable, object);
        (Self { smg, variables }, object)
    }

    /// Invalidate and forget every local of `function`.
    pub fn exit_function(&self, function: &str) -> Result<Self> {
        let mut smg = self.smg.clone();
        let mut variables = self.variables.clone();
        for (variable, object) in self.variables.iter() {
            if variable.is_local_of(function) {
                smg = smg.invalidate(*object)?;
                variables.remove(variable);
            }
        }
        Ok(Self { smg, variables })
    }

    pub fn write_variable(&self, variable: &Variable, offset: u64, size: u64, value: ValueId) -> Result<Self> {
        let object = self.object_of(variable)?;
        Ok(self.with_smg(self.smg.write_value(object, offset, size, value)?))
    }

    /// Store a fresh explicit value into a variable.
    pub fn write_explicit(&self, variable: &Variable, offset: u64, size: u64, value: impl Into<BigInt>) -> Result<Self> {
        let (smg, v) = self.smg.add_explicit(value);
        self.with_smg(smg).write_variable(variable, offset, size, v)
    }

    /// Store the address `target + target_offset` into a variable.
    pub fn write_address(
        &self,
        variable: &Variable,
        offset: u64,
        size: u64,
        target: ObjectId,
        target_offset: u64,
    ) -> Result<Self> {
        let specifier = if self.smg.object_checked(target)?.is_abstract() {
            TargetSpecifier::First
        } else {
            TargetSpecifier::Region
        };
        let (smg, address) = self.smg.address_of(target, target_offset, specifier)?;
        self.with_smg(smg).write_variable(variable, offset, size, address)
    }

    /// The value stored in `[offset, offset + size)` of a variable.
    ///
    /// Reading an out-of-scope (invalidated) variable fails with
    /// [`SmgError::InvalidAccess`].
    pub fn read_variable(&self, variable: &Variable, offset: u64, size: u64) -> Result<Option<ValueId>> {
        let object = self.object_of(variable)?;
        self.smg.read_value(object, offset, size)
    }
}
