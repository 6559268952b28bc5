//! The symbolic memory graph.
//!
//! # Structure
//!
//! An [`Smg`] is a bipartite graph of memory objects and symbolic values:
//!
//! ```text
//!   object --has-value(offset, size)--> value --points-to(offset)--> object
//! ```
//!
//! All components are stored in persistent ordered maps keyed by handles
//! ([`ObjectId`], [`ValueId`]). Cloning a graph is O(1), and every public
//! mutator returns a new graph sharing all untouched structure with the
//! receiver, so thousands of near-identical heap snapshots can coexist.
//!
//! # Invariants
//!
//! - Handle 0 is the null object (size 0, invalid) and value 0 is the
//!   explicit zero pointing to it.
//! - Every points-to edge targets an object present in the graph. Invalid
//!   (freed) objects stay in the graph so that dangling pointers remain
//!   detectable.
//! - Every has-value edge lies within its object, and edges of one object
//!   never overlap.
//! - Every list segment summarises at least one node.
//!
//! [`Smg::check_invariants`] verifies all of the above.

use std::collections::{BTreeMap, BTreeSet};

use im::{OrdMap, OrdSet};
use log::{debug, trace};
use num_bigint::BigInt;

use crate::edge::{HasValueEdge, PointsToEdge, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::object::{MemoryObject, SmgObject};
use crate::types::{ObjectId, ValueId};
use crate::value::SymbolicValue;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Smg {
    objects: OrdMap<ObjectId, SmgObject>,
    validity: OrdMap<ObjectId, bool>,
    values: OrdMap<ValueId, SymbolicValue>,
    has_value_edges: OrdMap<ObjectId, OrdSet<HasValueEdge>>,
    points_to_edges: OrdMap<ValueId, PointsToEdge>,
}

impl Default for Smg {
    fn default() -> Self {
        Smg::new()
    }
}

impl Smg {
    /// Create a graph holding only the null object and the zero value.
    pub fn new() -> Self {
        let mut objects = OrdMap::new();
        objects.insert(ObjectId::NULL, SmgObject::region(0));
        let mut validity = OrdMap::new();
        validity.insert(ObjectId::NULL, false);
        let mut values = OrdMap::new();
        values.insert(ValueId::ZERO, SymbolicValue::explicit(0));
        let mut points_to_edges = OrdMap::new();
        points_to_edges.insert(ValueId::ZERO, PointsToEdge::region(ObjectId::NULL, 0));

        Self {
            objects,
            validity,
            values,
            has_value_edges: OrdMap::new(),
            points_to_edges,
        }
    }
}

// Queries.
impl Smg {
    pub fn object(&self, id: ObjectId) -> Option<&SmgObject> {
        self.objects.get(&id)
    }

    pub fn object_checked(&self, id: ObjectId) -> Result<&SmgObject> {
        self.objects.get(&id).ok_or(SmgError::UnknownObject(id))
    }

    pub fn value(&self, id: ValueId) -> Option<&SymbolicValue> {
        self.values.get(&id)
    }

    pub fn value_checked(&self, id: ValueId) -> Result<&SymbolicValue> {
        self.values.get(&id).ok_or(SmgError::UnknownValue(id))
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn contains_value(&self, id: ValueId) -> bool {
        self.values.contains_key(&id)
    }

    /// All objects, in handle order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SmgObject)> + '_ {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    /// All values, in handle order.
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &SymbolicValue)> + '_ {
        self.values.iter().map(|(id, v)| (*id, v))
    }

    /// All points-to edges, in value order.
    pub fn points_to_edges(&self) -> impl Iterator<Item = (ValueId, &PointsToEdge)> + '_ {
        self.points_to_edges.iter().map(|(id, e)| (*id, e))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Whether the object exists and may be accessed.
    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.validity.get(&id).copied().unwrap_or(false)
    }

    /// Valid list segments of the graph.
    pub fn all_valid_abstracted_objects(&self) -> BTreeSet<ObjectId> {
        self.objects
            .iter()
            .filter(|(id, obj)| obj.is_abstract() && self.is_valid(**id))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn has_abstracted_objects(&self) -> bool {
        self.objects
            .iter()
            .any(|(id, obj)| obj.is_abstract() && self.is_valid(*id))
    }

    /// Has-value edges of an object, ordered by offset.
    pub fn has_value_edges(&self, id: ObjectId) -> impl Iterator<Item = &HasValueEdge> + '_ {
        self.has_value_edges.get(&id).into_iter().flat_map(|edges| edges.iter())
    }

    /// The value stored exactly in the field `[offset, offset + size)`, if any.
    ///
    /// Fails with [`SmgError::InvalidAccess`] on an invalidated object.
    pub fn read_value(&self, id: ObjectId, offset: u64, size: u64) -> Result<Option<ValueId>> {
        self.check_access(id)?;
        Ok(self.field_value(id, offset, size))
    }

    /// Like [`Smg::read_value`], without the validity check.
    pub(crate) fn field_value(&self, id: ObjectId, offset: u64, size: u64) -> Option<ValueId> {
        self.has_value_edges(id)
            .find(|e| e.offset == offset && e.size == size)
            .map(|e| e.value)
    }

    pub fn points_to(&self, value: ValueId) -> Option<&PointsToEdge> {
        self.points_to_edges.get(&value)
    }

    pub fn is_address(&self, value: ValueId) -> bool {
        self.points_to_edges.contains_key(&value)
    }

    /// Address values pointing into `target`.
    pub fn pointers_to(&self, target: ObjectId) -> Vec<ValueId> {
        self.points_to_edges
            .iter()
            .filter(|(_, e)| e.target == target)
            .map(|(v, _)| *v)
            .collect()
    }

    /// The existing address value for `target + offset`, if any.
    pub fn find_address(&self, target: ObjectId, offset: u64, specifier: TargetSpecifier) -> Option<ValueId> {
        let edge = PointsToEdge::new(target, offset, specifier);
        self.points_to_edges
            .iter()
            .find(|(_, e)| **e == edge)
            .map(|(v, _)| *v)
    }

    /// Every has-value edge holding each value, in object order.
    pub fn value_uses(&self) -> BTreeMap<ValueId, Vec<(ObjectId, HasValueEdge)>> {
        let mut uses: BTreeMap<ValueId, Vec<(ObjectId, HasValueEdge)>> = BTreeMap::new();
        for (obj, edges) in self.has_value_edges.iter() {
            for e in edges.iter() {
                uses.entry(e.value).or_default().push((*obj, *e));
            }
        }
        uses
    }

    fn fresh_object_id(&self) -> ObjectId {
        self.objects.get_max().map_or(ObjectId::new(1), |(id, _)| id.next())
    }

    fn fresh_value_id(&self) -> ValueId {
        self.values.get_max().map_or(ValueId::new(1), |(id, _)| id.next())
    }
}

// Pure mutators.
impl Smg {
    /// Add a new valid object.
    pub fn add_object(&self, object: SmgObject) -> (Smg, ObjectId) {
        let mut smg = self.clone();
        let id = smg.insert_object(object, true);
        (smg, id)
    }

    /// Add a fresh value.
    pub fn add_value(&self, value: SymbolicValue) -> (Smg, ValueId) {
        let mut smg = self.clone();
        let id = smg.insert_value(value);
        (smg, id)
    }

    /// Add a fresh explicit value.
    pub fn add_explicit(&self, value: impl Into<BigInt>) -> (Smg, ValueId) {
        self.add_value(SymbolicValue::explicit(value))
    }

    /// Add a has-value edge to `object`.
    ///
    /// Fails with [`SmgError::MalformedGraph`] if the edge does not fit into
    /// the object or overlaps an existing edge; use [`Smg::write_value`] to
    /// overwrite fields. Invalid objects cannot be written.
    pub fn add_has_value_edge(&self, object: ObjectId, edge: HasValueEdge) -> Result<Smg> {
        self.check_access(object)?;
        self.check_edge(object, &edge)?;
        if let Some(old) = self.has_value_edges(object).find(|e| e.overlaps(edge.offset, edge.size)) {
            return Err(SmgError::malformed(format!(
                "edge {} overlaps {} in {}",
                edge, old, object
            )));
        }
        let mut smg = self.clone();
        smg.insert_edge(object, edge);
        Ok(smg)
    }

    /// Make `value` the address `edge.target + edge.offset`.
    pub fn add_points_to_edge(&self, value: ValueId, edge: PointsToEdge) -> Result<Smg> {
        self.value_checked(value)?;
        let target = self.object_checked(edge.target)?;
        check_specifier(edge.target, target, edge.specifier)?;
        match self.points_to(value) {
            Some(old) if *old != edge => {
                return Err(SmgError::malformed(format!(
                    "{} already points to {}, cannot point to {}",
                    value, old, edge
                )));
            }
            Some(_) => return Ok(self.clone()),
            None => {}
        }
        let mut smg = self.clone();
        smg.points_to_edges.insert(value, edge);
        Ok(smg)
    }

    /// The canonical address of `target + offset`, created on demand.
    pub fn address_of(&self, target: ObjectId, offset: u64, specifier: TargetSpecifier) -> Result<(Smg, ValueId)> {
        let object = self.object_checked(target)?;
        check_specifier(target, object, specifier)?;
        let mut smg = self.clone();
        let value = smg.make_address(PointsToEdge::new(target, offset, specifier));
        Ok((smg, value))
    }

    /// Store `value` into `[offset, offset + size)` of `object`, dropping every
    /// edge it overlaps.
    pub fn write_value(&self, object: ObjectId, offset: u64, size: u64, value: ValueId) -> Result<Smg> {
        let edge = HasValueEdge::new(offset, size, value);
        self.check_access(object)?;
        self.check_edge(object, &edge)?;
        trace!("write {} into {}", edge, object);
        let mut smg = self.clone();
        smg.remove_overlapping(object, offset, size);
        smg.insert_edge(object, edge);
        Ok(smg)
    }

    /// Mark an object as no longer accessible.
    ///
    /// The object stays in the graph (pointers to it remain well-formed and
    /// dangling accesses detectable), but its contents are dropped.
    pub fn invalidate(&self, object: ObjectId) -> Result<Smg> {
        self.object_checked(object)?;
        debug!("invalidate {}", object);
        let mut smg = self.clone();
        smg.validity.insert(object, false);
        smg.has_value_edges.remove(&object);
        Ok(smg)
    }
}

// In-place building blocks, used on owned copies by the abstraction engine
// and the join.
impl Smg {
    pub(crate) fn insert_object(&mut self, object: SmgObject, valid: bool) -> ObjectId {
        let id = self.fresh_object_id();
        self.objects.insert(id, object);
        self.validity.insert(id, valid);
        id
    }

    pub(crate) fn insert_value(&mut self, value: SymbolicValue) -> ValueId {
        let id = self.fresh_value_id();
        self.values.insert(id, value);
        id
    }

    /// Insert without checks; the caller guarantees the invariants.
    pub(crate) fn insert_edge(&mut self, object: ObjectId, edge: HasValueEdge) {
        let edges = self.has_value_edges.get(&object).cloned().unwrap_or_default();
        self.has_value_edges.insert(object, edges.update(edge));
    }

    pub(crate) fn set_points_to(&mut self, value: ValueId, edge: PointsToEdge) {
        self.points_to_edges.insert(value, edge);
    }

    pub(crate) fn replace_object(&mut self, id: ObjectId, object: SmgObject) {
        self.objects.insert(id, object);
    }

    pub(crate) fn make_address(&mut self, edge: PointsToEdge) -> ValueId {
        if edge == PointsToEdge::region(ObjectId::NULL, 0) {
            return ValueId::ZERO;
        }
        if let Some(v) = self.find_address(edge.target, edge.offset, edge.specifier) {
            return v;
        }
        let v = self.insert_value(SymbolicValue::Unknown);
        self.points_to_edges.insert(v, edge);
        v
    }

    fn remove_overlapping(&mut self, object: ObjectId, offset: u64, size: u64) {
        if let Some(edges) = self.has_value_edges.get(&object) {
            let kept: OrdSet<HasValueEdge> = edges.iter().filter(|e| !e.overlaps(offset, size)).copied().collect();
            self.has_value_edges.insert(object, kept);
        }
    }

    /// Drop an object with its edges. Pointers into it must be gone already.
    pub(crate) fn remove_object(&mut self, object: ObjectId) {
        self.objects.remove(&object);
        self.validity.remove(&object);
        self.has_value_edges.remove(&object);
    }

    /// Drop those `candidates` that no has-value edge holds any more.
    pub(crate) fn remove_orphan_values(&mut self, candidates: impl IntoIterator<Item = ValueId>) {
        let candidates: BTreeSet<ValueId> = candidates.into_iter().filter(|v| !v.is_zero()).collect();
        if candidates.is_empty() {
            return;
        }
        let used: BTreeSet<ValueId> = self
            .has_value_edges
            .values()
            .flat_map(|edges| edges.iter().map(|e| e.value))
            .filter(|v| candidates.contains(v))
            .collect();
        for v in candidates.difference(&used) {
            trace!("remove orphan value {}", v);
            self.values.remove(v);
            self.points_to_edges.remove(v);
        }
    }
}

// Invariant checks.
impl Smg {
    /// Program accesses go to valid objects only. The null object is left to
    /// the bounds check, which rejects every access to it.
    fn check_access(&self, object: ObjectId) -> Result<()> {
        self.object_checked(object)?;
        if !object.is_null() && !self.is_valid(object) {
            return Err(SmgError::InvalidAccess(object));
        }
        Ok(())
    }

    fn check_edge(&self, object: ObjectId, edge: &HasValueEdge) -> Result<()> {
        let obj = self.object_checked(object)?;
        self.value_checked(edge.value)?;
        if !obj.contains_range(edge.offset, edge.size) {
            return Err(SmgError::malformed(format!(
                "edge {} out of bounds of {} ({})",
                edge, object, obj
            )));
        }
        Ok(())
    }

    /// Verify every structural invariant of the graph.
    pub fn check_invariants(&self) -> Result<()> {
        if self.is_valid(ObjectId::NULL) || self.object(ObjectId::NULL) != Some(&SmgObject::region(0)) {
            return Err(SmgError::malformed("null object missing or valid"));
        }
        if self.points_to(ValueId::ZERO) != Some(&PointsToEdge::region(ObjectId::NULL, 0)) {
            return Err(SmgError::malformed("zero value does not point to null"));
        }
        for (id, obj) in self.objects.iter() {
            if !self.validity.contains_key(id) {
                return Err(SmgError::malformed(format!("{} has no validity", id)));
            }
            if obj.min_length() < 1 {
                return Err(SmgError::malformed(format!("{} is an empty segment", id)));
            }
        }
        for (id, edges) in self.has_value_edges.iter() {
            let mut last_end = 0;
            for e in edges.iter() {
                self.check_edge(*id, e)?;
                if e.offset < last_end {
                    return Err(SmgError::malformed(format!("overlapping edges in {}", id)));
                }
                last_end = e.end();
            }
        }
        for (v, e) in self.points_to_edges.iter() {
            self.value_checked(*v)?;
            let target = self.object(e.target).ok_or_else(|| {
                SmgError::malformed(format!("{} points to missing object {}", v, e.target))
            })?;
            check_specifier(e.target, target, e.specifier)?;
        }
        Ok(())
    }
}

fn check_specifier(id: ObjectId, object: &SmgObject, specifier: TargetSpecifier) -> Result<()> {
    match (object, specifier) {
        (SmgObject::Region(_), TargetSpecifier::Region) | (SmgObject::ListSegment(_), TargetSpecifier::First) => {
            Ok(())
        }
        _ => Err(SmgError::malformed(format!(
            "pointer specifier {:?} does not fit {} ({})",
            specifier, id, object
        ))),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::object::ListSegment;

    #[test]
    fn test_new() {
        let smg = Smg::new();
        assert_eq!(smg.object_count(), 1);
        assert!(!smg.is_valid(ObjectId::NULL));
        assert_eq!(smg.points_to(ValueId::ZERO), Some(&PointsToEdge::region(ObjectId::NULL, 0)));
        assert!(smg.check_invariants().is_ok());
    }

    #[test]
    fn test_mutators_are_pure() {
        let smg = Smg::new();
        let (smg2, o) = smg.add_object(SmgObject::region(8));
        assert!(!smg.contains_object(o));
        assert!(smg2.contains_object(o));
        assert!(smg2.is_valid(o));

        let smg3 = smg2.invalidate(o).unwrap();
        assert!(smg2.is_valid(o));
        assert!(!smg3.is_valid(o));
        assert!(smg3.contains_object(o));
    }

    #[test]
    fn test_has_value_edge_bounds() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(8));
        let (smg, v) = smg.add_explicit(1);
        assert!(smg.add_has_value_edge(o, HasValueEdge::new(0, 8, v)).is_ok());
        assert!(matches!(
            smg.add_has_value_edge(o, HasValueEdge::new(4, 8, v)),
            Err(SmgError::MalformedGraph { .. })
        ));
        assert!(matches!(
            smg.add_has_value_edge(ObjectId::new(42), HasValueEdge::new(0, 4, v)),
            Err(SmgError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_overlapping_add_rejected_but_write_replaces() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(8));
        let (smg, v1) = smg.add_explicit(1);
        let (smg, v2) = smg.add_explicit(2);
        let smg = smg.add_has_value_edge(o, HasValueEdge::new(0, 4, v1)).unwrap();
        assert!(smg.add_has_value_edge(o, HasValueEdge::new(2, 4, v2)).is_err());

        let smg = smg.write_value(o, 0, 8, v2).unwrap();
        assert_eq!(smg.read_value(o, 0, 4), Ok(None));
        assert_eq!(smg.read_value(o, 0, 8), Ok(Some(v2)));
        assert!(smg.check_invariants().is_ok());
    }

    #[test]
    fn test_addresses_are_canonical() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(16));
        let (smg, a1) = smg.address_of(o, 8, TargetSpecifier::Region).unwrap();
        let (smg, a2) = smg.address_of(o, 8, TargetSpecifier::Region).unwrap();
        let (smg, a3) = smg.address_of(o, 0, TargetSpecifier::Region).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
        assert_eq!(smg.pointers_to(o), vec![a1, a3]);
        let (_, null) = smg.address_of(ObjectId::NULL, 0, TargetSpecifier::Region).unwrap();
        assert_eq!(null, ValueId::ZERO);
    }

    #[test]
    fn test_specifier_must_fit_target() {
        let (smg, seg) = Smg::new().add_object(SmgObject::segment(16, 0, 8, 2));
        assert!(smg.address_of(seg, 0, TargetSpecifier::Region).is_err());
        assert!(smg.address_of(seg, 0, TargetSpecifier::First).is_ok());
    }

    #[test]
    fn test_points_to_cannot_be_redirected() {
        let (smg, o1) = Smg::new().add_object(SmgObject::region(8));
        let (smg, o2) = smg.add_object(SmgObject::region(8));
        let (smg, v) = smg.add_value(SymbolicValue::Unknown);
        let smg = smg.add_points_to_edge(v, PointsToEdge::region(o1, 0)).unwrap();
        assert!(smg.add_points_to_edge(v, PointsToEdge::region(o1, 0)).is_ok());
        assert!(smg.add_points_to_edge(v, PointsToEdge::region(o2, 0)).is_err());
    }

    #[test]
    fn test_invalidate_keeps_pointer_targets() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(8));
        let (smg, p) = smg.address_of(o, 0, TargetSpecifier::Region).unwrap();
        let (smg, v) = smg.add_explicit(7);
        let smg = smg.write_value(o, 0, 8, v).unwrap();
        let smg = smg.invalidate(o).unwrap();
        assert_eq!(smg.points_to(p).map(|e| e.target), Some(o));
        assert_eq!(smg.has_value_edges(o).count(), 0);
        assert!(smg.check_invariants().is_ok());
    }

    #[test]
    fn test_invalid_object_access_is_rejected() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(8));
        let (smg, v) = smg.add_explicit(7);
        let freed = smg.invalidate(o).unwrap();

        assert_eq!(freed.write_value(o, 0, 8, v), Err(SmgError::InvalidAccess(o)));
        assert_eq!(
            freed.add_has_value_edge(o, HasValueEdge::new(0, 8, v)),
            Err(SmgError::InvalidAccess(o))
        );
        assert_eq!(freed.read_value(o, 0, 8), Err(SmgError::InvalidAccess(o)));
        assert_eq!(freed.has_value_edges(o).count(), 0);

        // An uninitialized field of a valid object is not an error.
        assert_eq!(smg.read_value(o, 0, 8), Ok(None));
        assert_eq!(smg.read_value(ObjectId::new(42), 0, 8), Err(SmgError::UnknownObject(ObjectId::new(42))));
    }

    #[test]
    fn test_check_invariants_detects_empty_segment() {
        // The constructor refuses empty segments; a literal can still build one.
        let empty = ListSegment {
            size: 16,
            head_offset: 0,
            next_offset: 8,
            min_length: 0,
        };
        let (smg, _) = Smg::new().add_object(SmgObject::ListSegment(empty));
        assert!(matches!(smg.check_invariants(), Err(SmgError::MalformedGraph { .. })));
    }

    #[test]
    fn test_abstracted_objects() {
        let (smg, _) = Smg::new().add_object(SmgObject::region(16));
        assert!(!smg.has_abstracted_objects());
        let (smg, seg) = smg.add_object(SmgObject::segment(16, 0, 8, 2));
        assert!(smg.has_abstracted_objects());
        assert_eq!(smg.all_valid_abstracted_objects().into_iter().collect::<Vec<_>>(), vec![seg]);
        let smg = smg.invalidate(seg).unwrap();
        assert!(!smg.has_abstracted_objects());
    }

    #[test]
    fn test_check_invariants_detects_dangling_target() {
        let (mut smg, v) = Smg::new().add_value(SymbolicValue::Unknown);
        smg.set_points_to(v, PointsToEdge::region(ObjectId::new(99), 0));
        assert!(matches!(smg.check_invariants(), Err(SmgError::MalformedGraph { .. })));
    }

    #[test]
    fn test_check_invariants_detects_out_of_bounds_edge() {
        let (mut smg, o) = Smg::new().add_object(SmgObject::region(4));
        smg.insert_edge(o, HasValueEdge::new(0, 8, ValueId::ZERO));
        assert!(matches!(smg.check_invariants(), Err(SmgError::MalformedGraph { .. })));
    }

    #[test]
    fn test_value_equality_shares_structure() {
        let (a, o) = Smg::new().add_object(SmgObject::region(8));
        let (b, o2) = Smg::new().add_object(SmgObject::region(8));
        assert_eq!(o, o2);
        assert_eq!(a, b);
        let c = a.write_value(o, 0, 8, ValueId::ZERO).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_remove_orphan_values() {
        let (smg, o) = Smg::new().add_object(SmgObject::region(8));
        let (smg, kept) = smg.add_explicit(1);
        let (mut smg, dropped) = smg.add_explicit(2);
        smg.insert_edge(o, HasValueEdge::new(0, 8, kept));
        smg.remove_orphan_values([kept, dropped, ValueId::ZERO]);
        assert!(smg.contains_value(kept));
        assert!(!smg.contains_value(dropped));
        assert!(smg.contains_value(ValueId::ZERO));
    }
}
