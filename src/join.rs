//! Entailment and join of symbolic memory graphs.
//!
//! # Algorithm
//!
//! The join walks both graphs in lock-step, starting from the objects of
//! equally named variables, and builds the merged graph one object pair at a
//! time. Every pair of objects and every pair of values is mapped to exactly
//! one merged counterpart, which makes the walk terminate on cyclic heaps.
//!
//! An object pair is joined in one of two ways:
//!
//! - **Pairwise**: two regions of equal size become one region. Fields with
//!   the same offset and size are joined recursively; a field present on one
//!   side only is dropped (the merged region knows less), unless it overlaps
//!   a differently sized field on the other side, in which case the graphs
//!   are unjoinable.
//! - **Folding**: if the pair starts list chains (see
//!   [`ListChain`][crate::abstraction::ListChain]) and at least one side has
//!   more list nodes or a segment there, a prefix of each chain is folded
//!   into one merged list segment whose minimum length is the smaller of both
//!   prefix weights. The join then continues with the values following the
//!   prefixes.
//!
//! Several foldings may be possible; they are tried longest first on a
//! snapshot of the walk, and the first one whose remaining walk succeeds
//! wins.
//!
//! # Status
//!
//! Each step records whether the merged graph became more general than the
//! left or the right input (a value generalized, a field dropped, two
//! occurrences of one value mapped apart, nodes folded into a segment, a
//! segment shortened). The final [`MergeStatus`] is the join of all steps.
//! Missing a loss on the right side would let the merge operator discard a
//! state that is not covered, so every step flags conservatively.
//!
//! Objects not reachable from any variable are not part of the merged graph.

use std::cell::Cell;
use std::collections::BTreeSet;

use im::OrdMap;
use log::{debug, trace};
use num_bigint::BigInt;

use crate::abstraction::{is_pointer, GraphIndex, ListChain, ListShape};
use crate::edge::{HasValueEdge, PointsToEdge, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::interrupt::InterruptFlag;
use crate::object::{MemoryObject, SmgObject};
use crate::smg::Smg;
use crate::spc::{SymbolicProgramConfiguration, Variable};
use crate::status::MergeStatus;
use crate::types::{ObjectId, ValueId};
use crate::value::SymbolicValue;

/// Foldings tried per object pair.
const MAX_FOLD_ATTEMPTS: usize = 16;

/// Object pairs visited per join, across all attempts.
const MAX_OBJECT_VISITS: usize = 100_000;

/// Two joined configurations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JoinResult {
    pub configuration: SymbolicProgramConfiguration,
    pub status: MergeStatus,
}

/// Join two configurations.
///
/// Returns `Ok(None)` when the configurations cannot be joined: different
/// variables, or heap shapes without a common generalization. Fails with
/// [`SmgError::MalformedGraph`] if either graph violates an invariant.
pub fn join(
    left: &SymbolicProgramConfiguration,
    right: &SymbolicProgramConfiguration,
    interrupt: &InterruptFlag,
) -> Result<Option<JoinResult>> {
    let variables: Vec<&Variable> = left.variables().map(|(v, _)| v).collect();
    if !variables.iter().copied().eq(right.variables().map(|(v, _)| v)) {
        debug!("unjoinable: variables differ");
        return Ok(None);
    }
    let left_roots: Vec<ObjectId> = left.variables().map(|(_, o)| o).collect();
    let right_roots: Vec<ObjectId> = right.variables().map(|(_, o)| o).collect();

    let Some(joined) = join_graphs(left.smg(), &left_roots, right.smg(), &right_roots, interrupt)? else {
        return Ok(None);
    };
    let mapping: OrdMap<Variable, ObjectId> = variables.into_iter().cloned().zip(joined.roots).collect();
    Ok(Some(JoinResult {
        configuration: SymbolicProgramConfiguration::from_parts(joined.smg, mapping),
        status: joined.status,
    }))
}

/// Whether every concrete heap described by `left` is also described by `right`.
pub fn is_less_or_equal(
    left: &SymbolicProgramConfiguration,
    right: &SymbolicProgramConfiguration,
    interrupt: &InterruptFlag,
) -> Result<bool> {
    Ok(join(left, right, interrupt)?.is_some_and(|r| r.status.left_entails_right()))
}

/// The merged graph of two joined graphs.
#[derive(Debug, Clone)]
pub struct GraphJoin {
    pub smg: Smg,
    pub status: MergeStatus,
    /// Merged objects of the root pairs, in input order.
    pub roots: Vec<ObjectId>,
}

/// Join two graphs, pairing `left_roots[i]` with `right_roots[i]`.
pub fn join_graphs(
    left: &Smg,
    left_roots: &[ObjectId],
    right: &Smg,
    right_roots: &[ObjectId],
    interrupt: &InterruptFlag,
) -> Result<Option<GraphJoin>> {
    assert_eq!(left_roots.len(), right_roots.len(), "Roots must come in pairs");
    left.check_invariants()?;
    right.check_invariants()?;

    let left = Side::new(left, left_roots);
    let right = Side::new(right, right_roots);
    let budget = Cell::new(MAX_OBJECT_VISITS);
    let mut ctx = JoinContext::new(&left, &right, interrupt, &budget);

    let walk = left_roots
        .iter()
        .zip(right_roots)
        .map(|(&a, &b)| ctx.join_objects(a, b))
        .collect::<Step<Vec<ObjectId>>>();
    match walk {
        Ok(roots) => {
            debug!(
                "joined {} and {} objects into {} ({})",
                left.smg.object_count(),
                right.smg.object_count(),
                ctx.merged.object_count(),
                ctx.status
            );
            Ok(Some(GraphJoin {
                smg: ctx.merged,
                status: ctx.status,
                roots,
            }))
        }
        Err(Abort::Unjoinable(reason)) => {
            debug!("unjoinable: {}", reason);
            Ok(None)
        }
        Err(Abort::Fatal(e)) => Err(e),
    }
}

/// Why a walk stopped.
#[derive(Debug)]
enum Abort {
    /// Expected outcome: keep both states apart.
    Unjoinable(String),
    Fatal(SmgError),
}

impl From<SmgError> for Abort {
    fn from(e: SmgError) -> Self {
        Abort::Fatal(e)
    }
}

type Step<T> = std::result::Result<T, Abort>;

fn unjoinable<T>(reason: impl Into<String>) -> Step<T> {
    Err(Abort::Unjoinable(reason.into()))
}

/// One input graph with its lookup structures.
struct Side<'a> {
    smg: &'a Smg,
    index: GraphIndex,
    roots: BTreeSet<ObjectId>,
}

impl<'a> Side<'a> {
    fn new(smg: &'a Smg, roots: &[ObjectId]) -> Self {
        Self {
            smg,
            index: GraphIndex::new(smg),
            roots: roots.iter().copied().collect(),
        }
    }

    /// The chain starting at `start`, cut before the first element that is
    /// already joined.
    fn chain(&self, start: ObjectId, shape: ListShape, joined: &OrdMap<ObjectId, ObjectId>) -> Option<ListChain> {
        let chain = ListChain::discover_with(self.smg, &self.index, start, shape, &self.roots)?;
        match chain.elements.iter().skip(1).position(|o| joined.contains_key(o)) {
            Some(cut) => Some(chain.prefix(cut + 1)),
            None => Some(chain),
        }
    }

    /// Shape of a segment, including the size of its next field.
    fn segment_shape(&self, object: ObjectId) -> Option<ListShape> {
        let seg = self.smg.object(object)?.as_segment()?;
        let next = self.smg.has_value_edges(object).find(|e| e.offset == seg.next_offset)?;
        Some(ListShape {
            size: seg.size,
            head_offset: seg.head_offset,
            next_offset: seg.next_offset,
            next_size: next.size,
        })
    }

    /// Summary of one scalar field over all elements of a prefix.
    fn summarize(&self, elements: &[ObjectId], offset: u64, size: u64) -> SymbolicValue {
        let mut values = elements
            .iter()
            .map(|&o| self.smg.field_value(o, offset, size).and_then(|v| self.smg.value(v)));
        let Some(Some(first)) = values.next() else {
            return SymbolicValue::Unknown;
        };
        if values.all(|v| v == Some(first)) {
            first.clone()
        } else {
            SymbolicValue::Unknown
        }
    }
}

/// How to join one object pair.
#[derive(Debug, Clone)]
enum Plan {
    Pairwise,
    Fold(ListChain, ListChain),
}

/// State of one walk. Cloning is cheap, which lets the join try a folding
/// and roll back if the rest of the walk fails.
#[derive(Clone)]
struct JoinContext<'a> {
    left: &'a Side<'a>,
    right: &'a Side<'a>,
    interrupt: &'a InterruptFlag,
    budget: &'a Cell<usize>,
    merged: Smg,
    status: MergeStatus,
    objects: OrdMap<(ObjectId, ObjectId), ObjectId>,
    left_objects: OrdMap<ObjectId, ObjectId>,
    right_objects: OrdMap<ObjectId, ObjectId>,
    values: OrdMap<(ValueId, ValueId), ValueId>,
    left_values: OrdMap<ValueId, ValueId>,
    right_values: OrdMap<ValueId, ValueId>,
    /// Merged explicit values, one per constant.
    explicit: OrdMap<BigInt, ValueId>,
}

impl<'a> JoinContext<'a> {
    fn new(left: &'a Side<'a>, right: &'a Side<'a>, interrupt: &'a InterruptFlag, budget: &'a Cell<usize>) -> Self {
        let mut ctx = Self {
            left,
            right,
            interrupt,
            budget,
            merged: Smg::new(),
            status: MergeStatus::Equal,
            objects: OrdMap::new(),
            left_objects: OrdMap::new(),
            right_objects: OrdMap::new(),
            values: OrdMap::new(),
            left_values: OrdMap::new(),
            right_values: OrdMap::new(),
            explicit: OrdMap::new(),
        };
        ctx.map_objects(ObjectId::NULL, ObjectId::NULL, ObjectId::NULL);
        ctx.values.insert((ValueId::ZERO, ValueId::ZERO), ValueId::ZERO);
        ctx.left_values.insert(ValueId::ZERO, ValueId::ZERO);
        ctx.right_values.insert(ValueId::ZERO, ValueId::ZERO);
        ctx.explicit.insert(BigInt::from(0), ValueId::ZERO);
        ctx
    }

    fn lose(&mut self, left: bool, right: bool) {
        self.status = self.status.join(MergeStatus::from_loss(left, right));
    }

    fn map_objects(&mut self, a: ObjectId, b: ObjectId, merged: ObjectId) {
        self.objects.insert((a, b), merged);
        self.left_objects.insert(a, merged);
        self.right_objects.insert(b, merged);
    }

    fn map_values(&mut self, a: ValueId, b: ValueId, merged: ValueId) {
        self.values.insert((a, b), merged);
        let left_split = self.left_values.insert(a, merged).is_some_and(|old| old != merged);
        let right_split = self.right_values.insert(b, merged).is_some_and(|old| old != merged);
        if left_split || right_split {
            trace!("{} / {} mapped apart", a, b);
            self.lose(left_split, right_split);
        }
    }

    fn merged_scalar(&mut self, value: SymbolicValue) -> ValueId {
        match value {
            SymbolicValue::Explicit(c) => {
                if let Some(&v) = self.explicit.get(&c) {
                    return v;
                }
                let v = self.merged.insert_value(SymbolicValue::Explicit(c.clone()));
                self.explicit.insert(c, v);
                v
            }
            SymbolicValue::Unknown => self.merged.insert_value(SymbolicValue::Unknown),
        }
    }

    fn join_values(&mut self, a: ValueId, b: ValueId) -> Step<ValueId> {
        if let Some(&m) = self.values.get(&(a, b)) {
            return Ok(m);
        }
        let pointer_a = self.left.smg.points_to(a).filter(|_| !a.is_zero()).copied();
        let pointer_b = self.right.smg.points_to(b).filter(|_| !b.is_zero()).copied();
        let merged = match (pointer_a, pointer_b) {
            (None, None) => {
                let sa = self.left.smg.value_checked(a)?.clone();
                let sb = self.right.smg.value_checked(b)?.clone();
                let joined = sa.generalize(&sb);
                self.lose(sa != joined, sb != joined);
                self.merged_scalar(joined)
            }
            (Some(ea), Some(eb)) => {
                if ea.offset != eb.offset {
                    return unjoinable(format!("{} and {} point to different offsets", ea, eb));
                }
                let target = self.join_objects(ea.target, eb.target)?;
                let specifier = if self.merged.object_checked(target)?.is_abstract() {
                    TargetSpecifier::First
                } else {
                    TargetSpecifier::Region
                };
                // The walk may have paired both values while joining the targets.
                if let Some(&m) = self.values.get(&(a, b)) {
                    return Ok(m);
                }
                self.merged.make_address(PointsToEdge::new(target, ea.offset, specifier))
            }
            _ => return unjoinable(format!("address {} / {} against a scalar", a, b)),
        };
        trace!("{} / {} => {}", a, b, merged);
        self.map_values(a, b, merged);
        Ok(merged)
    }

    fn join_objects(&mut self, a: ObjectId, b: ObjectId) -> Step<ObjectId> {
        if let Some(&m) = self.objects.get(&(a, b)) {
            return Ok(m);
        }
        self.interrupt.check()?;
        let visits = self.budget.get();
        if visits == 0 {
            return unjoinable("join budget exhausted");
        }
        self.budget.set(visits - 1);

        if self.left_objects.contains_key(&a) || self.right_objects.contains_key(&b) {
            return unjoinable(format!("{} or {} is already joined with another object", a, b));
        }
        if a.is_null() || b.is_null() {
            return unjoinable(format!("null against {} / {}", a, b));
        }
        let obj_a = *self.left.smg.object_checked(a)?;
        let obj_b = *self.right.smg.object_checked(b)?;
        let valid = self.left.smg.is_valid(a);
        if valid != self.right.smg.is_valid(b) {
            return unjoinable(format!("validity of {} and {} differs", a, b));
        }
        if !valid {
            if obj_a != obj_b {
                return unjoinable(format!("invalid objects {} and {} differ", obj_a, obj_b));
            }
            let m = self.merged.insert_object(obj_a, false);
            self.map_objects(a, b, m);
            return Ok(m);
        }
        if obj_a.size() != obj_b.size() {
            return unjoinable(format!("sizes of {} and {} differ", obj_a, obj_b));
        }

        let plans = self.plans(a, &obj_a, b, &obj_b)?;
        trace!("{} / {}: {} plan(s)", a, b, plans.len());
        let mut last = format!("no way to join {} and {}", a, b);
        for plan in plans {
            let mut attempt = self.clone();
            let outcome = match &plan {
                Plan::Pairwise => attempt.join_regions(a, b, obj_a.size()),
                Plan::Fold(ca, cb) => attempt.fold(ca, cb),
            };
            match outcome {
                Ok(m) => {
                    *self = attempt;
                    return Ok(m);
                }
                Err(Abort::Unjoinable(reason)) => {
                    trace!("{} / {}: {:?} failed: {}", a, b, plan, reason);
                    last = reason;
                }
                Err(fatal) => return Err(fatal),
            }
        }
        unjoinable(last)
    }

    /// Ways to join a valid pair of equally sized objects, best first.
    fn plans(&self, a: ObjectId, obj_a: &SmgObject, b: ObjectId, obj_b: &SmgObject) -> Step<Vec<Plan>> {
        let both_regions = obj_a.is_region() && obj_b.is_region();
        let shapes = if both_regions {
            let mut shapes: Vec<ListShape> = ListShape::candidates(self.left.smg, a)
                .into_iter()
                .filter(|s| s.fits(self.right.smg, b))
                .collect();
            for s in ListShape::candidates(self.right.smg, b) {
                if s.fits(self.left.smg, a) && !shapes.contains(&s) {
                    shapes.push(s);
                }
            }
            shapes
        } else {
            let shape = match (self.left.segment_shape(a), self.right.segment_shape(b)) {
                (Some(sa), Some(sb)) if sa == sb => sa,
                (Some(s), None) | (None, Some(s)) => s,
                _ => return unjoinable(format!("{} and {} are incompatible segments", obj_a, obj_b)),
            };
            vec![shape]
        };

        let mut plans = Vec::new();
        let mut pairwise = false;
        for shape in shapes {
            let (Some(ca), Some(cb)) = (
                self.left.chain(a, shape, &self.left_objects),
                self.right.chain(b, shape, &self.right_objects),
            ) else {
                continue;
            };
            let mut folds = Vec::new();
            if self.same_signature(&ca, &cb) {
                if both_regions {
                    if !pairwise {
                        plans.push(Plan::Pairwise);
                        pairwise = true;
                    }
                } else {
                    folds.push((1, 1));
                }
            }
            let mut prefixes: Vec<(usize, usize)> = (1..=ca.len())
                .flat_map(|i| (1..=cb.len()).map(move |j| (i, j)))
                .filter(|&(i, j)| !both_regions || i > 1 || j > 1)
                .collect();
            prefixes.sort_by(|x, y| (y.0 + y.1, y.0).cmp(&(x.0 + x.1, x.0)));
            for p in prefixes {
                if !folds.contains(&p) {
                    folds.push(p);
                }
            }
            folds.truncate(MAX_FOLD_ATTEMPTS);
            plans.extend(folds.into_iter().map(|(i, j)| Plan::Fold(ca.prefix(i), cb.prefix(j))));
        }
        if both_regions && !pairwise {
            plans.push(Plan::Pairwise);
        }
        Ok(plans)
    }

    /// Whether both chains have the same length and element kinds.
    fn same_signature(&self, ca: &ListChain, cb: &ListChain) -> bool {
        ca.len() == cb.len()
            && ca.elements.iter().zip(&cb.elements).all(|(&x, &y)| {
                let kx = self.left.smg.object(x).map(|o| o.is_region());
                let ky = self.right.smg.object(y).map(|o| o.is_region());
                kx == ky
            })
    }

    fn join_regions(&mut self, a: ObjectId, b: ObjectId, size: u64) -> Step<ObjectId> {
        let m = self.merged.insert_object(SmgObject::region(size), true);
        self.map_objects(a, b, m);

        let edges_a: Vec<HasValueEdge> = self.left.smg.has_value_edges(a).copied().collect();
        let edges_b: Vec<HasValueEdge> = self.right.smg.has_value_edges(b).copied().collect();
        let mut pairs = Vec::new();
        let (mut left_dropped, mut right_dropped) = (false, false);
        for ea in &edges_a {
            match edges_b.iter().find(|eb| eb.same_field(ea)) {
                Some(eb) => pairs.push((*ea, *eb)),
                None if edges_b.iter().any(|eb| eb.overlaps(ea.offset, ea.size)) => {
                    return unjoinable(format!("field {} of {} overlaps a different field of {}", ea, a, b));
                }
                None => left_dropped = true,
            }
        }
        for eb in &edges_b {
            if !edges_a.iter().any(|ea| ea.same_field(eb)) {
                if edges_a.iter().any(|ea| ea.overlaps(eb.offset, eb.size)) {
                    return unjoinable(format!("field {} of {} overlaps a different field of {}", eb, b, a));
                }
                right_dropped = true;
            }
        }
        self.lose(left_dropped, right_dropped);

        for (ea, eb) in pairs {
            let v = self.join_values(ea.value, eb.value)?;
            self.merged.insert_edge(m, HasValueEdge::new(ea.offset, ea.size, v));
        }
        Ok(m)
    }

    /// Fold two chain prefixes into one merged segment.
    fn fold(&mut self, ca: &ListChain, cb: &ListChain) -> Step<ObjectId> {
        let shape = ca.shape;
        let (left, right) = (self.left.smg, self.right.smg);
        let weight_a = ca.weight(left);
        let weight_b = cb.weight(right);
        let min_length = weight_a.min(weight_b);
        let m = self.merged.insert_object(
            SmgObject::segment(shape.size, shape.head_offset, shape.next_offset, min_length),
            true,
        );
        self.objects.insert((ca.first(), cb.first()), m);
        for &o in &ca.elements {
            self.left_objects.insert(o, m);
        }
        for &o in &cb.elements {
            self.right_objects.insert(o, m);
        }

        let concrete = |smg: &Smg, chain: &ListChain| chain.elements.iter().any(|&o| smg.object(o).is_some_and(|x| x.is_region()));
        let mut left_lost = ca.len() > 1 || concrete(left, ca) || weight_a > min_length;
        let mut right_lost = cb.len() > 1 || concrete(right, cb) || weight_b > min_length;

        let fields_a: Vec<HasValueEdge> = shape.data_fields(left, ca.first()).copied().collect();
        let fields_b: Vec<HasValueEdge> = shape.data_fields(right, cb.first()).copied().collect();
        if fields_a.len() != fields_b.len() || fields_a.iter().zip(&fields_b).any(|(x, y)| !x.same_field(y)) {
            return unjoinable(format!("node layouts of {} and {} differ", ca.first(), cb.first()));
        }
        for (fa, fb) in fields_a.iter().zip(&fields_b) {
            let v = if is_pointer(left, fa.value) || is_pointer(right, fb.value) {
                let same_a = ca.elements.iter().all(|&o| left.field_value(o, fa.offset, fa.size) == Some(fa.value));
                let same_b = cb.elements.iter().all(|&o| right.field_value(o, fb.offset, fb.size) == Some(fb.value));
                if !same_a || !same_b {
                    return unjoinable(format!("field at {} mixes addresses and scalars", fa.offset));
                }
                self.join_values(fa.value, fb.value)?
            } else {
                // Scalars of a segment are per node; nothing to pair.
                let sa = self.left.summarize(&ca.elements, fa.offset, fa.size);
                let sb = self.right.summarize(&cb.elements, fb.offset, fb.size);
                let joined = sa.generalize(&sb);
                left_lost |= sa != joined;
                right_lost |= sb != joined;
                self.merged_scalar(joined)
            };
            self.merged.insert_edge(m, HasValueEdge::new(fa.offset, fa.size, v));
        }
        self.lose(left_lost, right_lost);
        debug!(
            "folded {:?} / {:?} into {} ({}+)",
            ca.elements, cb.elements, m, min_length
        );

        let next_a = ca
            .next_value(left)
            .ok_or_else(|| SmgError::malformed(format!("{} has no next field", ca.last())))?;
        let next_b = cb
            .next_value(right)
            .ok_or_else(|| SmgError::malformed(format!("{} has no next field", cb.last())))?;
        let next = self.join_values(next_a, next_b)?;
        self.merged
            .insert_edge(m, HasValueEdge::new(shape.next_offset, shape.next_size, next));
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const NODE: u64 = 16;
    const NFO: u64 = 8;

    fn x() -> Variable {
        Variable::global("x")
    }

    /// `x` pointing to a list of concrete nodes holding `data`.
    fn list(data: &[i64]) -> SymbolicProgramConfiguration {
        let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let mut smg = spc.smg().clone();
        let mut next = ValueId::ZERO;
        for &d in data.iter().rev() {
            let (s, n) = smg.add_object(SmgObject::region(NODE));
            let (s, dv) = s.add_explicit(d);
            let s = s.write_value(n, 0, 8, dv).unwrap();
            let s = s.write_value(n, NFO, 8, next).unwrap();
            let (s, a) = s.address_of(n, 0, TargetSpecifier::Region).unwrap();
            smg = s;
            next = a;
        }
        spc.with_smg(smg).write_variable(&x(), 0, 8, next).unwrap()
    }

    /// `x` pointing to a segment of at least `min` nodes.
    fn segment(min: u32, data: Option<i64>) -> SymbolicProgramConfiguration {
        let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let (smg, seg) = spc.smg().add_object(SmgObject::segment(NODE, 0, NFO, min));
        let (smg, dv) = match data {
            Some(d) => smg.add_explicit(d),
            None => smg.add_value(SymbolicValue::Unknown),
        };
        let smg = smg.write_value(seg, 0, 8, dv).unwrap();
        let smg = smg.write_value(seg, NFO, 8, ValueId::ZERO).unwrap();
        spc.with_smg(smg).write_address(&x(), 0, 8, seg, 0).unwrap()
    }

    fn target(spc: &SymbolicProgramConfiguration) -> ObjectId {
        let v = spc.read_variable(&x(), 0, 8).unwrap().unwrap();
        spc.smg().points_to(v).unwrap().target
    }

    fn join_ok(a: &SymbolicProgramConfiguration, b: &SymbolicProgramConfiguration) -> JoinResult {
        join(a, b, &InterruptFlag::new()).unwrap().unwrap()
    }

    #[test]
    fn test_join_identical_is_equal() {
        let a = list(&[1, 2, 3]);
        let r = join_ok(&a, &a);
        assert_eq!(r.status, MergeStatus::Equal);
        assert!(!r.configuration.smg().has_abstracted_objects());
        assert_eq!(r.configuration.smg().object_count(), a.smg().object_count());
    }

    #[test]
    fn test_join_segments_is_equal() {
        let a = segment(2, None);
        let r = join_ok(&a, &a);
        assert_eq!(r.status, MergeStatus::Equal);
    }

    #[test]
    fn test_join_lists_of_different_length() {
        let a = list(&[1, 1]);
        let b = list(&[1, 1, 1]);
        let r = join_ok(&a, &b);
        assert_eq!(r.status, MergeStatus::Incomparable);
        let merged = &r.configuration;
        let seg = target(merged);
        assert_eq!(merged.smg().object(seg).unwrap().min_length(), 2);
        assert_eq!(merged.smg().read_value(seg, NFO, 8), Ok(Some(ValueId::ZERO)));
        let data = merged.smg().read_value(seg, 0, 8).unwrap().unwrap();
        assert_eq!(merged.smg().value(data), Some(&SymbolicValue::explicit(1)));
        assert!(merged.smg().check_invariants().is_ok());
    }

    #[test]
    fn test_segment_covers_longer_list() {
        let seg = segment(2, None);
        let long = list(&[4, 5, 6]);
        let r = join_ok(&long, &seg);
        assert_eq!(r.status, MergeStatus::LeftEntail);
        assert!(is_less_or_equal(&long, &seg, &InterruptFlag::new()).unwrap());
        assert!(!is_less_or_equal(&seg, &long, &InterruptFlag::new()).unwrap());
    }

    #[test]
    fn test_shorter_segment_is_more_general() {
        let two = segment(2, None);
        let three = segment(3, None);
        assert_eq!(join_ok(&two, &three).status, MergeStatus::RightEntail);
        assert!(is_less_or_equal(&three, &two, &InterruptFlag::new()).unwrap());
        assert!(!is_less_or_equal(&two, &three, &InterruptFlag::new()).unwrap());
    }

    #[test]
    fn test_explicit_segment_data_is_more_specific() {
        let known = segment(2, Some(7));
        let unknown = segment(2, None);
        assert_eq!(join_ok(&known, &unknown).status, MergeStatus::LeftEntail);
    }

    #[test]
    fn test_scalar_generalization() {
        let (a, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 4);
        let a1 = a.write_explicit(&x(), 0, 4, 1).unwrap();
        let a2 = a.write_explicit(&x(), 0, 4, 2).unwrap();
        let r = join_ok(&a1, &a2);
        assert_eq!(r.status, MergeStatus::Incomparable);
        let v = r.configuration.read_variable(&x(), 0, 4).unwrap().unwrap();
        assert_eq!(r.configuration.smg().value(v), Some(&SymbolicValue::Unknown));
    }

    #[test]
    fn test_dropped_field_loses_information() {
        let (a, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let written = a.write_explicit(&x(), 0, 4, 1).unwrap();
        assert_eq!(join_ok(&written, &a).status, MergeStatus::LeftEntail);
        assert_eq!(join_ok(&a, &written).status, MergeStatus::RightEntail);
    }

    #[test]
    fn test_overlapping_fields_are_unjoinable() {
        let (a, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let narrow = a.write_explicit(&x(), 0, 4, 1).unwrap();
        let wide = a.write_explicit(&x(), 0, 8, 1).unwrap();
        assert_eq!(join(&narrow, &wide, &InterruptFlag::new()), Ok(None));
    }

    #[test]
    fn test_null_against_list_is_unjoinable() {
        let (empty, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let empty = empty.write_variable(&x(), 0, 8, ValueId::ZERO).unwrap();
        assert_eq!(join(&empty, &list(&[1]), &InterruptFlag::new()), Ok(None));
    }

    #[test]
    fn test_different_variables_are_unjoinable() {
        let (a, _) = SymbolicProgramConfiguration::new().declare_variable(x(), 8);
        let (b, _) = SymbolicProgramConfiguration::new().declare_variable(Variable::global("y"), 8);
        assert_eq!(join(&a, &b, &InterruptFlag::new()), Ok(None));
    }

    #[test]
    fn test_aliasing_must_agree() {
        let y = Variable::global("y");
        let base = list(&[1]);
        let (base, _) = base.declare_variable(y.clone(), 8);
        let node = target(&base);

        // a: y aliases x's node; b: y points to a separate node.
        let a = base.write_address(&y, 0, 8, node, 0).unwrap();
        let (smg, other) = base.smg().add_object(SmgObject::region(NODE));
        let b = base.with_smg(smg).write_address(&y, 0, 8, other, 0).unwrap();
        assert_eq!(join(&a, &b, &InterruptFlag::new()), Ok(None));
    }

    #[test]
    fn test_cyclic_lists() {
        let cyclic = |len: usize| {
            let spc = list(&vec![0; len]);
            let head = target(&spc);
            let mut last = head;
            for _ in 1..len {
                let v = spc.smg().read_value(last, NFO, 8).unwrap().unwrap();
                last = spc.smg().points_to(v).unwrap().target;
            }
            let (smg, back) = spc.smg().address_of(head, 0, TargetSpecifier::Region).unwrap();
            spc.with_smg(smg.write_value(last, NFO, 8, back).unwrap())
        };
        let r = join_ok(&cyclic(2), &cyclic(3));
        assert_eq!(r.status, MergeStatus::Incomparable);
        let seg = target(&r.configuration);
        let next = r.configuration.smg().read_value(seg, NFO, 8).unwrap().unwrap();
        assert_eq!(r.configuration.smg().points_to(next).unwrap().target, seg);
    }

    #[test]
    fn test_malformed_input_is_fatal() {
        let a = list(&[1]);
        let mut smg = a.smg().clone();
        smg.set_points_to(ValueId::new(999), PointsToEdge::region(ObjectId::new(999), 0));
        let broken = a.with_smg(smg);
        assert!(matches!(
            join(&broken, &a, &InterruptFlag::new()),
            Err(SmgError::MalformedGraph { .. }) | Err(SmgError::UnknownValue(_))
        ));
    }

    #[test]
    fn test_interrupt() {
        let a = list(&[1, 2]);
        let flag = InterruptFlag::new();
        flag.request();
        assert_eq!(join(&a, &a, &flag), Err(SmgError::Interrupted));
    }
}
