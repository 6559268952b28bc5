//! List abstraction.
//!
//! # Chains
//!
//! A [`ListChain`] is a maximal run of objects `e₁ → e₂ → … → eₙ` such that
//!
//! - every element is a valid region, or a list segment, of one
//!   [`ListShape`] (node size, head offset, next field);
//! - each `eᵢ₊₁` is reachable *only* through the next field of `eᵢ`: the
//!   address of `eᵢ₊₁` is held by exactly that field and no other address
//!   points into `eᵢ₊₁`;
//! - all elements have the same field layout and hold identical addresses in
//!   their non-next fields (scalars may differ).
//!
//! The first element may be referenced from anywhere. Variables' objects are
//! never chain elements.
//!
//! # Folding
//!
//! [`abstract_lists`] replaces every chain of at least two elements that
//! summarises at least [`AbstractionOptions::min_list_length`] nodes by a
//! single [`ListSegment`]. Non-next fields keep their value when all
//! elements agree on an explicit value or an address; otherwise they become
//! a fresh unknown value, which a segment interprets as "each node holds some
//! value of its own". Pointers to the first element are redirected to the
//! segment; the interior next pointers disappear with the folded objects.
//!
//! Cyclic lists fold the same way: the chain stops before revisiting its
//! first element, so the segment's next field ends up holding the segment's
//! own address.
//!
//! # Materialization
//!
//! [`materialize_first`] splits the first node off a segment, and
//! [`concretize`] unrolls a segment into an exact number of regions.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};

use crate::edge::{HasValueEdge, PointsToEdge, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::interrupt::InterruptFlag;
use crate::object::{ListSegment, MemoryObject, SmgObject};
use crate::smg::Smg;
use crate::types::{ObjectId, ValueId};
use crate::value::SymbolicValue;

/// Options of the abstraction engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AbstractionOptions {
    /// Whether lists are abstracted at all.
    pub enabled: bool,
    /// Least number of list nodes worth folding; values below 2 count as 2.
    pub min_list_length: u32,
}

impl Default for AbstractionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_list_length: 2,
        }
    }
}

/// Node layout of a singly linked list.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListShape {
    pub size: u64,
    pub head_offset: u64,
    pub next_offset: u64,
    pub next_size: u64,
}

impl ListShape {
    /// Shapes under which `object` could be the first element of a chain.
    pub fn candidates(smg: &Smg, object: ObjectId) -> Vec<ListShape> {
        let Some(obj) = smg.object(object) else {
            return Vec::new();
        };
        let mut shapes = Vec::new();
        for e in smg.has_value_edges(object) {
            let Some(pt) = smg.points_to(e.value) else {
                continue;
            };
            let shape = ListShape {
                size: obj.size(),
                head_offset: pt.offset,
                next_offset: e.offset,
                next_size: e.size,
            };
            let segment_agrees = match obj {
                SmgObject::ListSegment(seg) => seg.head_offset == shape.head_offset && seg.next_offset == e.offset,
                SmgObject::Region(_) => true,
            };
            let target_fits = smg.object(pt.target).is_some_and(|t| shape.fits_object(t));
            if segment_agrees && target_fits && !pt.target.is_null() && !shapes.contains(&shape) {
                shapes.push(shape);
            }
        }
        shapes
    }

    fn fits_object(&self, obj: &SmgObject) -> bool {
        match obj {
            SmgObject::Region(r) => r.size == self.size,
            SmgObject::ListSegment(s) => {
                s.size == self.size && s.head_offset == self.head_offset && s.next_offset == self.next_offset
            }
        }
    }

    /// Whether `object` is a valid element of this shape with a next field.
    pub fn fits(&self, smg: &Smg, object: ObjectId) -> bool {
        !object.is_null()
            && smg.is_valid(object)
            && smg.object(object).is_some_and(|o| self.fits_object(o))
            && self.next_value(smg, object).is_some()
    }

    pub fn next_value(&self, smg: &Smg, object: ObjectId) -> Option<ValueId> {
        smg.field_value(object, self.next_offset, self.next_size)
    }

    fn is_next_field(&self, e: &HasValueEdge) -> bool {
        e.offset == self.next_offset && e.size == self.next_size
    }

    /// Non-next fields of `object`.
    pub fn data_fields<'a>(&'a self, smg: &'a Smg, object: ObjectId) -> impl Iterator<Item = &'a HasValueEdge> + 'a {
        smg.has_value_edges(object).filter(move |e| !self.is_next_field(e))
    }

    /// Whether two elements agree on their field layout and held addresses.
    pub fn compatible(&self, smg: &Smg, a: ObjectId, b: ObjectId) -> bool {
        let fa: Vec<&HasValueEdge> = self.data_fields(smg, a).collect();
        let fb: Vec<&HasValueEdge> = self.data_fields(smg, b).collect();
        fa.len() == fb.len()
            && fa.iter().zip(fb.iter()).all(|(ea, eb)| {
                ea.same_field(eb)
                    && match (is_pointer(smg, ea.value), is_pointer(smg, eb.value)) {
                        (true, true) => ea.value == eb.value,
                        (false, false) => true,
                        _ => false,
                    }
            })
    }
}

/// Whether `value` is an address other than null, which doubles as the
/// constant 0.
pub(crate) fn is_pointer(smg: &Smg, value: ValueId) -> bool {
    !value.is_zero() && smg.is_address(value)
}

/// Reverse lookups over one graph.
pub(crate) struct GraphIndex {
    uses: BTreeMap<ValueId, Vec<(ObjectId, HasValueEdge)>>,
    incoming: BTreeMap<ObjectId, Vec<ValueId>>,
}

impl GraphIndex {
    pub(crate) fn new(smg: &Smg) -> Self {
        let mut incoming: BTreeMap<ObjectId, Vec<ValueId>> = BTreeMap::new();
        for (v, e) in smg.points_to_edges() {
            incoming.entry(e.target).or_default().push(v);
        }
        Self {
            uses: smg.value_uses(),
            incoming,
        }
    }

    pub(crate) fn uses(&self, value: ValueId) -> &[(ObjectId, HasValueEdge)] {
        self.uses.get(&value).map_or(&[], |u| u.as_slice())
    }

    pub(crate) fn incoming(&self, object: ObjectId) -> &[ValueId] {
        self.incoming.get(&object).map_or(&[], |i| i.as_slice())
    }

    /// The only element that links to `object` through its next field, if
    /// `object` is reachable in no other way.
    fn sole_predecessor(&self, shape: &ListShape, object: ObjectId) -> Option<ObjectId> {
        let [address] = self.incoming(object) else {
            return None;
        };
        let [(pred, edge)] = self.uses(*address) else {
            return None;
        };
        (shape.is_next_field(edge) && *pred != object).then_some(*pred)
    }
}

/// A maximal same-shape run of list elements.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ListChain {
    pub shape: ListShape,
    pub elements: Vec<ObjectId>,
}

impl ListChain {
    /// Follow next fields from `start` as long as the chain conditions hold.
    ///
    /// Returns `None` if `start` itself cannot begin a chain of `shape`.
    pub fn discover(smg: &Smg, start: ObjectId, shape: ListShape, roots: &BTreeSet<ObjectId>) -> Option<ListChain> {
        Self::discover_with(smg, &GraphIndex::new(smg), start, shape, roots)
    }

    pub(crate) fn discover_with(
        smg: &Smg,
        index: &GraphIndex,
        start: ObjectId,
        shape: ListShape,
        roots: &BTreeSet<ObjectId>,
    ) -> Option<ListChain> {
        if roots.contains(&start) || !shape.fits(smg, start) {
            return None;
        }
        let mut elements = vec![start];
        let mut current = start;
        loop {
            let Some(next) = Self::successor(smg, index, &shape, current, roots) else {
                break;
            };
            if elements.contains(&next) || !shape.compatible(smg, start, next) {
                break;
            }
            elements.push(next);
            current = next;
        }
        trace!("chain from {}: {:?}", start, elements);
        Some(ListChain { shape, elements })
    }

    /// The element following `current`, if it may sit inside a chain.
    fn successor(
        smg: &Smg,
        index: &GraphIndex,
        shape: &ListShape,
        current: ObjectId,
        roots: &BTreeSet<ObjectId>,
    ) -> Option<ObjectId> {
        let address = shape.next_value(smg, current)?;
        let pt = smg.points_to(address)?;
        if pt.offset != shape.head_offset || roots.contains(&pt.target) || !shape.fits(smg, pt.target) {
            return None;
        }
        (index.sole_predecessor(shape, pt.target) == Some(current)).then_some(pt.target)
    }

    pub fn first(&self) -> ObjectId {
        self.elements[0]
    }

    pub fn last(&self) -> ObjectId {
        self.elements[self.elements.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of list nodes summarised by the chain.
    pub fn weight(&self, smg: &Smg) -> u32 {
        self.elements
            .iter()
            .map(|&e| smg.object(e).map_or(0, |o| o.min_length()))
            .sum()
    }

    /// The chain cut after its first `len` elements.
    pub fn prefix(&self, len: usize) -> ListChain {
        ListChain {
            shape: self.shape,
            elements: self.elements[..len].to_vec(),
        }
    }

    /// Value held by the next field of the last element.
    pub fn next_value(&self, smg: &Smg) -> Option<ValueId> {
        self.shape.next_value(smg, self.last())
    }
}

/// Fold every eligible list chain into a list segment.
///
/// Objects in `roots` (variables) are never folded.
pub fn abstract_lists(
    smg: &Smg,
    roots: &BTreeSet<ObjectId>,
    options: &AbstractionOptions,
    interrupt: &InterruptFlag,
) -> Result<Smg> {
    if !options.enabled {
        return Ok(smg.clone());
    }
    let min_length = options.min_list_length.max(2);

    let mut smg = smg.clone();
    'search: loop {
        let index = GraphIndex::new(&smg);
        let candidates: Vec<ObjectId> = smg.objects().map(|(id, _)| id).collect();
        for object in candidates {
            interrupt.check()?;
            for shape in ListShape::candidates(&smg, object) {
                let start = chain_start(&smg, &index, &shape, object, roots);
                let Some(chain) = ListChain::discover_with(&smg, &index, start, shape, roots) else {
                    continue;
                };
                if chain.len() >= 2 && chain.weight(&smg) >= min_length {
                    let segment = fold_chain(&mut smg, &chain)?;
                    debug!(
                        "folded {:?} into {} ({})",
                        chain.elements,
                        segment,
                        smg.object_checked(segment)?
                    );
                    continue 'search;
                }
            }
        }
        return Ok(smg);
    }
}

/// Walk predecessors back from `object` to the start of its chain; on a
/// cycle, the smallest handle on the cycle is the start.
fn chain_start(smg: &Smg, index: &GraphIndex, shape: &ListShape, object: ObjectId, roots: &BTreeSet<ObjectId>) -> ObjectId {
    let mut seen = BTreeSet::new();
    let mut current = object;
    while seen.insert(current) {
        let Some(pred) = index.sole_predecessor(shape, current) else {
            return current;
        };
        if roots.contains(&pred) || !shape.fits(smg, pred) || !shape.compatible(smg, pred, current) {
            return current;
        }
        current = pred;
    }
    *seen.iter().next().unwrap_or(&object)
}

/// Replace the elements of `chain` by one list segment.
pub(crate) fn fold_chain(smg: &mut Smg, chain: &ListChain) -> Result<ObjectId> {
    let shape = chain.shape;
    let first = chain.first();
    let next = chain
        .next_value(smg)
        .ok_or_else(|| SmgError::malformed(format!("chain end {} has no next field", chain.last())))?;

    // Field values of the summary.
    let mut fields = Vec::new();
    let mut replaced = Vec::new();
    let layout: Vec<HasValueEdge> = shape.data_fields(smg, first).copied().collect();
    for e in layout {
        let values: Vec<ValueId> = chain
            .elements
            .iter()
            .filter_map(|&o| smg.field_value(o, e.offset, e.size))
            .collect();
        replaced.extend(values.iter().copied());
        let value = summarize_field(smg, &values);
        fields.push(HasValueEdge::new(e.offset, e.size, value));
    }

    let segment = ListSegment::new(shape.size, shape.head_offset, shape.next_offset, chain.weight(smg));
    let seg = smg.insert_object(SmgObject::ListSegment(segment), true);
    for f in fields {
        smg.insert_edge(seg, f);
    }
    smg.insert_edge(seg, HasValueEdge::new(shape.next_offset, shape.next_size, next));

    // Redirect pointers to the first element.
    for address in smg.pointers_to(first) {
        if let Some(pt) = smg.points_to(address).copied() {
            smg.set_points_to(address, PointsToEdge::new(seg, pt.offset, TargetSpecifier::First));
        }
    }

    // Interior next pointers and the folded objects go away.
    let links: Vec<ValueId> = chain.elements[..chain.len() - 1]
        .iter()
        .filter_map(|&o| shape.next_value(smg, o))
        .collect();
    for &o in &chain.elements {
        smg.remove_object(o);
    }
    smg.remove_orphan_values(links.into_iter().chain(replaced));
    Ok(seg)
}

/// The summary value of one field across several nodes.
fn summarize_field(smg: &mut Smg, values: &[ValueId]) -> ValueId {
    let first = values[0];
    if is_pointer(smg, first) {
        // Chain compatibility guarantees identical addresses.
        return first;
    }
    let all_same_explicit = match smg.value(first) {
        Some(SymbolicValue::Explicit(c)) => values.iter().all(|&v| smg.value(v).and_then(|x| x.as_explicit()) == Some(c)),
        _ => false,
    };
    if all_same_explicit {
        first
    } else {
        smg.insert_value(SymbolicValue::Unknown)
    }
}

/// Result of splitting a node off a list segment.
#[derive(Debug, Clone)]
pub struct Materialization {
    pub smg: Smg,
    /// The new concrete first node.
    pub node: ObjectId,
    /// The remaining segment, if the list may continue.
    pub rest: Option<ObjectId>,
}

/// Split the first node off `segment`.
///
/// A segment of minimum length `n ≥ 2` yields one graph, in which a region
/// precedes a segment of minimum length `n - 1`. A segment of minimum length 1
/// yields two graphs: one where the list is exactly that single node, and one
/// where a segment of minimum length 1 follows it.
pub fn materialize_first(smg: &Smg, segment: ObjectId) -> Result<Vec<Materialization>> {
    let seg = *smg
        .object_checked(segment)?
        .as_segment()
        .ok_or_else(|| SmgError::malformed(format!("{} is not a list segment", segment)))?;
    if !smg.is_valid(segment) {
        return Err(SmgError::malformed(format!("materializing invalid segment {}", segment)));
    }
    let next_edge = smg
        .has_value_edges(segment)
        .find(|e| e.offset == seg.next_offset)
        .copied()
        .ok_or_else(|| SmgError::malformed(format!("segment {} has no next field", segment)))?;

    let mut base = smg.clone();
    let node = base.insert_object(SmgObject::region(seg.size), true);
    for e in smg.has_value_edges(segment).filter(|e| **e != next_edge) {
        let value = if smg.is_address(e.value) || smg.value(e.value).is_some_and(|v| v.is_explicit()) {
            e.value
        } else {
            base.insert_value(SymbolicValue::Unknown)
        };
        base.insert_edge(node, HasValueEdge::new(e.offset, e.size, value));
    }
    for address in smg.pointers_to(segment) {
        if let Some(pt) = smg.points_to(address) {
            base.set_points_to(address, PointsToEdge::region(node, pt.offset));
        }
    }

    let mut results = Vec::new();
    if seg.min_length == 1 {
        let mut exact = base.clone();
        exact.insert_edge(node, HasValueEdge::new(next_edge.offset, next_edge.size, next_edge.value));
        let dropped: Vec<ValueId> = smg.has_value_edges(segment).map(|e| e.value).collect();
        exact.remove_object(segment);
        exact.remove_orphan_values(dropped);
        debug!("materialized {} as the single node {}", segment, node);
        results.push(Materialization {
            smg: exact,
            node,
            rest: None,
        });
    }

    let mut longer = base;
    longer.replace_object(
        segment,
        SmgObject::ListSegment(seg.with_min_length(seg.min_length.saturating_sub(1).max(1))),
    );
    let link = longer.make_address(PointsToEdge::new(segment, seg.head_offset, TargetSpecifier::First));
    longer.insert_edge(node, HasValueEdge::new(next_edge.offset, next_edge.size, link));
    debug!("materialized {} before the rest of {}", node, segment);
    results.push(Materialization {
        smg: longer,
        node,
        rest: Some(segment),
    });
    Ok(results)
}

/// Unroll `segment` into exactly `length` concrete nodes.
pub fn concretize(smg: &Smg, segment: ObjectId, length: u32) -> Result<Smg> {
    let min = smg.object_checked(segment)?.min_length();
    if length < min || length == 0 {
        return Err(SmgError::malformed(format!(
            "cannot concretize {} ({}+ nodes) to {} nodes",
            segment, min, length
        )));
    }
    let mut current = smg.clone();
    for i in 0..length {
        let mut options = materialize_first(&current, segment)?;
        let wanted = if i + 1 == length {
            options.iter().position(|m| m.rest.is_none())
        } else {
            options.iter().position(|m| m.rest.is_some())
        };
        let index = wanted.ok_or_else(|| SmgError::malformed(format!("{} cannot end after {} nodes", segment, i + 1)))?;
        current = options.swap_remove(index).smg;
    }
    Ok(current)
}
