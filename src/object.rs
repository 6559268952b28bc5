//! Memory objects of a symbolic memory graph.
//!
//! An object is either a concrete [`Region`] (a stack variable or heap block
//! of fixed size) or a [`ListSegment`], which summarises one or more nodes of
//! a singly linked list. Segments are produced only by the
//! [abstraction engine][crate::abstraction] and by [joining][crate::join]
//! states, never by ordinary program steps.
//!
//! A segment with minimum length `n` stands for every list of `n` or more
//! nodes, each of which has the segment's size and field layout, chained
//! through the field at `next_offset`. The segment's own next field holds the
//! value stored in the next field of the *last* summarised node.

use std::fmt::{Display, Formatter};

use log::warn;

use crate::error::{Result, SmgError};

/// Capabilities shared by all object kinds.
pub trait MemoryObject {
    /// Size of the object (of each node, for segments) in bytes.
    fn size(&self) -> u64;

    /// Whether the object summarises several concrete objects.
    fn is_abstract(&self) -> bool;

    /// Least number of concrete objects represented.
    fn min_length(&self) -> u32;

    /// Whether the byte range `[offset, offset + size)` lies inside the object.
    fn contains_range(&self, offset: u64, size: u64) -> bool {
        offset.checked_add(size).is_some_and(|end| end <= self.size())
    }
}

/// A concrete memory region.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Region {
    pub size: u64,
}

impl Region {
    pub fn new(size: u64) -> Self {
        Self { size }
    }
}

impl MemoryObject for Region {
    fn size(&self) -> u64 {
        self.size
    }
    fn is_abstract(&self) -> bool {
        false
    }
    fn min_length(&self) -> u32 {
        1
    }
}

/// Summary of `min_length` or more singly linked list nodes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListSegment {
    /// Size of every summarised node.
    pub size: u64,
    /// Offset at which incoming next pointers point into a node.
    pub head_offset: u64,
    /// Offset of the next field inside a node.
    pub next_offset: u64,
    /// Least number of summarised nodes (always at least 1).
    pub min_length: u32,
}

impl ListSegment {
    pub fn new(size: u64, head_offset: u64, next_offset: u64, min_length: u32) -> Self {
        assert!(min_length >= 1, "List segments summarise at least one node");
        Self {
            size,
            head_offset,
            next_offset,
            min_length,
        }
    }

    /// The same segment with a different minimum length.
    pub fn with_min_length(self, min_length: u32) -> Self {
        Self::new(self.size, self.head_offset, self.next_offset, min_length)
    }

    /// Whether nodes of both segments have the same layout.
    pub fn same_shape(&self, other: &ListSegment) -> bool {
        self.size == other.size && self.head_offset == other.head_offset && self.next_offset == other.next_offset
    }
}

impl MemoryObject for ListSegment {
    fn size(&self) -> u64 {
        self.size
    }
    fn is_abstract(&self) -> bool {
        true
    }
    fn min_length(&self) -> u32 {
        self.min_length
    }
}

/// A memory object: concrete region or abstract list segment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SmgObject {
    Region(Region),
    ListSegment(ListSegment),
}

impl SmgObject {
    pub fn region(size: u64) -> Self {
        SmgObject::Region(Region::new(size))
    }

    pub fn segment(size: u64, head_offset: u64, next_offset: u64, min_length: u32) -> Self {
        SmgObject::ListSegment(ListSegment::new(size, head_offset, next_offset, min_length))
    }

    pub fn as_segment(&self) -> Option<&ListSegment> {
        match self {
            SmgObject::ListSegment(seg) => Some(seg),
            SmgObject::Region(_) => None,
        }
    }

    pub fn is_region(&self) -> bool {
        matches!(self, SmgObject::Region(_))
    }
}

impl MemoryObject for SmgObject {
    fn size(&self) -> u64 {
        match self {
            SmgObject::Region(r) => r.size(),
            SmgObject::ListSegment(s) => s.size(),
        }
    }
    fn is_abstract(&self) -> bool {
        match self {
            SmgObject::Region(r) => r.is_abstract(),
            SmgObject::ListSegment(s) => s.is_abstract(),
        }
    }
    fn min_length(&self) -> u32 {
        match self {
            SmgObject::Region(r) => r.min_length(),
            SmgObject::ListSegment(s) => s.min_length(),
        }
    }
}

impl Display for SmgObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SmgObject::Region(r) => write!(f, "region[{}]", r.size),
            SmgObject::ListSegment(s) => write!(
                f,
                "sll[{}, hfo={}, nfo={}, {}+]",
                s.size, s.head_offset, s.next_offset, s.min_length
            ),
        }
    }
}

/// Size in bytes of an array of `length` elements.
///
/// Arrays whose length is only known at run time (variable-length arrays)
/// are not sized: the caller gets [`SmgError::UnsupportedSize`].
pub fn array_size(element_size: u64, length: Option<u64>) -> Result<u64> {
    match length {
        Some(length) => element_size.checked_mul(length).ok_or_else(|| SmgError::UnsupportedSize {
            reason: format!("array of {} x {} bytes overflows", length, element_size),
        }),
        None => Err(SmgError::UnsupportedSize {
            reason: "variable-length array".to_string(),
        }),
    }
}

/// Like [`array_size`], but sizes a variable-length array for `max_length`
/// elements, a caller-supplied upper bound on its length.
///
/// The result never undercuts the real size as long as the bound holds.
pub fn array_size_bounded(element_size: u64, length: Option<u64>, max_length: u64) -> Result<u64> {
    match length {
        Some(_) => array_size(element_size, length),
        None => {
            let size = array_size(element_size, Some(max_length))?;
            warn!(
                "variable-length array: assuming at most {} elements ({} bytes)",
                max_length, size
            );
            Ok(size)
        }
    }
}
