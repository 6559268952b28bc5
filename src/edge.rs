use std::fmt::{Display, Formatter};

use crate::types::{ObjectId, ValueId};

/// "The bytes `[offset, offset + size)` of the owning object hold `value`."
///
/// Edges are ordered by offset first, so iterating an object's edges walks
/// its fields front to back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HasValueEdge {
    pub offset: u64,
    pub size: u64,
    pub value: ValueId,
}

impl HasValueEdge {
    pub fn new(offset: u64, size: u64, value: ValueId) -> Self {
        Self { offset, size, value }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Whether the byte ranges of both edges intersect.
    pub fn overlaps(&self, offset: u64, size: u64) -> bool {
        self.offset < offset + size && offset < self.end()
    }

    /// Whether both edges cover exactly the same bytes.
    pub fn same_field(&self, other: &HasValueEdge) -> bool {
        self.offset == other.offset && self.size == other.size
    }
}

impl Display for HasValueEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}) = {}", self.offset, self.end(), self.value)
    }
}

/// Which concrete object an address into a target refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TargetSpecifier {
    /// The target is a concrete region.
    Region,
    /// The first node summarised by a list segment.
    First,
}

/// "This value is the address `target + offset`."
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PointsToEdge {
    pub target: ObjectId,
    pub offset: u64,
    pub specifier: TargetSpecifier,
}

impl PointsToEdge {
    pub fn new(target: ObjectId, offset: u64, specifier: TargetSpecifier) -> Self {
        Self {
            target,
            offset,
            specifier,
        }
    }

    pub fn region(target: ObjectId, offset: u64) -> Self {
        Self::new(target, offset, TargetSpecifier::Region)
    }
}

impl Display for PointsToEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.specifier {
            TargetSpecifier::Region => write!(f, "&{}+{}", self.target, self.offset),
            TargetSpecifier::First => write!(f, "&first({})+{}", self.target, self.offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps() {
        let e = HasValueEdge::new(4, 4, ValueId::ZERO);
        assert!(e.overlaps(0, 8));
        assert!(e.overlaps(7, 1));
        assert!(!e.overlaps(0, 4));
        assert!(!e.overlaps(8, 8));
    }

    #[test]
    fn test_edge_order_follows_offset() {
        let a = HasValueEdge::new(0, 8, ValueId::new(9));
        let b = HasValueEdge::new(8, 8, ValueId::new(1));
        assert!(a < b);
        assert!(a.same_field(&HasValueEdge::new(0, 8, ValueId::new(3))));
        assert!(!a.same_field(&HasValueEdge::new(0, 4, ValueId::new(9))));
    }

    #[test]
    fn test_display() {
        let p = PointsToEdge::region(ObjectId::new(2), 8);
        assert_eq!(p.to_string(), "&o2+8");
        let q = PointsToEdge::new(ObjectId::new(3), 0, TargetSpecifier::First);
        assert_eq!(q.to_string(), "&first(o3)+0");
    }
}
