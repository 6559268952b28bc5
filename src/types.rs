//! Type-safe handles for SMG objects and values.
//!
//! Objects and values live in persistent maps inside an [`Smg`][crate::smg::Smg]
//! and are referenced by small integer handles. Handles are only meaningful
//! relative to the graph that issued them: two different graphs may use the
//! same handle for unrelated entities, so any cross-graph correspondence goes
//! through an explicit mapping (see [`join`][crate::join]).
use std::fmt;

/// A handle to a memory object (region or list segment).
///
/// # Invariants
///
/// - Handle 0 is reserved for the null object, present in every graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The null object: zero-sized, never valid.
    pub const NULL: ObjectId = ObjectId(0);

    pub const fn new(id: u32) -> Self {
        ObjectId(id)
    }

    /// Returns the raw object handle as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the handle directly following this one.
    pub(crate) const fn next(self) -> Self {
        ObjectId(self.0 + 1)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "o{}", self.0)
        }
    }
}

impl From<ObjectId> for u32 {
    fn from(object: ObjectId) -> Self {
        object.0
    }
}

/// A handle to a symbolic value.
///
/// # Invariants
///
/// - Handle 0 is reserved for the explicit value zero, which is also the
///   address of the null object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// The zero value (and null address).
    pub const ZERO: ValueId = ValueId(0);

    pub const fn new(id: u32) -> Self {
        ValueId(id)
    }

    /// Returns the raw value handle as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn next(self) -> Self {
        ValueId(self.0 + 1)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<ValueId> for u32 {
    fn from(value: ValueId) -> Self {
        value.0
    }
}
