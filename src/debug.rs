//! Debug utilities for inspecting SMG structure.
//!
//! Read-only views of a graph for tests, logs and dump files. Which states
//! are dumped, and where, is decided by [`export`][crate::export].

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::edge::{HasValueEdge, PointsToEdge};
use crate::object::SmgObject;
use crate::smg::Smg;
use crate::spc::SymbolicProgramConfiguration;
use crate::types::ObjectId;
use crate::value::SymbolicValue;

/// One field of an object, resolved.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub edge: HasValueEdge,
    pub value: Option<SymbolicValue>,
    /// Set if the value is an address.
    pub points_to: Option<PointsToEdge>,
}

impl Display for FieldInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.edge)?;
        match (&self.points_to, &self.value) {
            (Some(pt), _) => write!(f, " -> {}", pt),
            (None, Some(v)) => write!(f, " ({})", v),
            (None, None) => write!(f, " (missing)"),
        }
    }
}

/// Detailed information about a single object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub object: SmgObject,
    pub valid: bool,
    pub fields: Vec<FieldInfo>,
}

impl Display for ObjectInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.id, self.object)?;
        if !self.valid {
            write!(f, " [invalid]")?;
        }
        for field in &self.fields {
            write!(f, "\n    {}", field)?;
        }
        Ok(())
    }
}

/// The objects reachable from a set of roots.
#[derive(Debug, Clone)]
pub struct SmgTree {
    pub roots: Vec<ObjectId>,
    pub objects: Vec<ObjectInfo>,
}

impl Display for SmgTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SMG (roots =")?;
        for r in &self.roots {
            write!(f, " {}", r)?;
        }
        writeln!(f, "):")?;
        for object in &self.objects {
            writeln!(f, "  {}", object)?;
        }
        Ok(())
    }
}

impl Smg {
    /// Get detailed information about a single object.
    pub fn object_info(&self, id: ObjectId) -> Option<ObjectInfo> {
        let object = *self.object(id)?;
        let fields = self
            .has_value_edges(id)
            .map(|e| FieldInfo {
                edge: *e,
                value: self.value(e.value).cloned(),
                points_to: self.points_to(e.value).copied(),
            })
            .collect();
        Some(ObjectInfo {
            id,
            object,
            valid: self.is_valid(id),
            fields,
        })
    }

    /// All objects reachable from `roots`, in handle order.
    pub fn debug_tree(&self, roots: &[ObjectId]) -> SmgTree {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<ObjectId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            for e in self.has_value_edges(id) {
                if let Some(pt) = self.points_to(e.value) {
                    stack.push(pt.target);
                }
            }
        }
        SmgTree {
            roots: roots.to_vec(),
            objects: visited.into_iter().filter_map(|id| self.object_info(id)).collect(),
        }
    }

    /// Dump every object of the graph, reachable or not.
    pub fn dump_state(&self) -> String {
        let mut result = format!(
            "=== SMG: {} objects, {} values ===\n",
            self.object_count(),
            self.value_count()
        );
        for info in self.objects().filter_map(|(id, _)| self.object_info(id)) {
            result.push_str(&format!("{}\n", info));
        }
        result
    }
}

impl SymbolicProgramConfiguration {
    /// Variables followed by the memory reachable from them.
    pub fn debug_string(&self) -> String {
        let mut result = String::new();
        for (variable, object) in self.variables() {
            result.push_str(&format!("{} = {}\n", variable, object));
        }
        let roots: Vec<ObjectId> = self.variables().map(|(_, o)| o).collect();
        result.push_str(&self.smg().debug_tree(&roots).to_string());
        result
    }
}
