//! The merge status lattice.
//!
//! ```text
//!            Incomparable
//!            /          \
//!     LeftEntail    RightEntail
//!            \          /
//!               Equal
//! ```
//!
//! A join walks both graphs and joins the status of every step; the final
//! status describes how the inputs relate to the merged graph:
//!
//! - `Equal`: both inputs are isomorphic to the merged graph.
//! - `LeftEntail`: the left input is at least as specific as the right one,
//!   and the merged graph is isomorphic to the right input.
//! - `RightEntail`: symmetric.
//! - `Incomparable`: the merged graph is strictly more general than both.

use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MergeStatus {
    Equal,
    LeftEntail,
    RightEntail,
    Incomparable,
}

impl MergeStatus {
    /// Status of a step that lost information from the given sides.
    pub fn from_loss(left_lost: bool, right_lost: bool) -> Self {
        match (left_lost, right_lost) {
            (false, false) => MergeStatus::Equal,
            (true, false) => MergeStatus::LeftEntail,
            (false, true) => MergeStatus::RightEntail,
            (true, true) => MergeStatus::Incomparable,
        }
    }

    /// Whether the merged graph is more general than the left input.
    pub fn left_lost(self) -> bool {
        matches!(self, MergeStatus::LeftEntail | MergeStatus::Incomparable)
    }

    /// Whether the merged graph is more general than the right input.
    pub fn right_lost(self) -> bool {
        matches!(self, MergeStatus::RightEntail | MergeStatus::Incomparable)
    }

    /// Least upper bound.
    pub fn join(self, other: MergeStatus) -> MergeStatus {
        MergeStatus::from_loss(
            self.left_lost() || other.left_lost(),
            self.right_lost() || other.right_lost(),
        )
    }

    /// Lattice order.
    pub fn le(self, other: MergeStatus) -> bool {
        self.join(other) == other
    }

    /// Status with the roles of both inputs exchanged.
    pub fn flip(self) -> MergeStatus {
        MergeStatus::from_loss(self.right_lost(), self.left_lost())
    }

    /// Whether the left input is subsumed by the right one.
    pub fn left_entails_right(self) -> bool {
        !self.right_lost()
    }
}

impl Display for MergeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeStatus::Equal => "EQUAL",
            MergeStatus::LeftEntail => "LEFT_ENTAIL",
            MergeStatus::RightEntail => "RIGHT_ENTAIL",
            MergeStatus::Incomparable => "INCOMPARABLE",
        };
        write!(f, "{}", s)
    }
}
