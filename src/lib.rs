//! # smg-rs: Symbolic Memory Graphs in Rust
//!
//! **`smg-rs`** is the heap-abstraction core of a static program analyser.
//! It represents the memory of a program under analysis as a **Symbolic
//! Memory Graph (SMG)** and provides what a fixpoint exploration needs to
//! terminate on programs that build unbounded linked lists:
//! list abstraction, entailment, and join.
//!
//! ## What is an SMG?
//!
//! An SMG is a bipartite graph of memory objects and symbolic values.
//! *Has-value* edges say which value is stored at which offset of an object;
//! *points-to* edges say which value is the address of which object.
//! Objects are concrete regions or **list segments**, which summarise any
//! number (above a minimum) of singly linked list nodes.
//!
//! ## Key Features
//!
//! - **Persistent graphs**: every mutation returns a new [`Smg`][crate::smg::Smg]
//!   sharing all untouched structure, so thousands of heap snapshots coexist cheaply.
//! - **Handles, not references**: objects and values are named by small `Copy`
//!   handles ([`ObjectId`][crate::types::ObjectId], [`ValueId`][crate::types::ValueId]),
//!   which makes cyclic heaps ordinary data.
//! - **List abstraction**: chains of same-shape nodes fold into segments and
//!   unfold again on demand ([`abstraction`]).
//! - **Join with status**: two states are joined into one that covers both,
//!   together with a [`MergeStatus`][crate::status::MergeStatus] telling whether
//!   either input already covered the other ([`join`]).
//! - **Merge policy**: [`MergeOperator`][crate::merge::MergeOperator] decides
//!   between keeping the reached state and replacing it by a join.
//!
//! ## Basic Usage
//!
//! ```rust
//! use smg_rs::interrupt::InterruptFlag;
//! use smg_rs::join::join;
//! use smg_rs::spc::{SymbolicProgramConfiguration, Variable};
//! use smg_rs::status::MergeStatus;
//!
//! let x = Variable::global("x");
//! let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(x.clone(), 4);
//! let one = spc.write_explicit(&x, 0, 4, 1).unwrap();
//! let two = spc.write_explicit(&x, 0, 4, 2).unwrap();
//!
//! // Neither state covers the other: x becomes unknown.
//! let joined = join(&one, &two, &InterruptFlag::new()).unwrap().unwrap();
//! assert_eq!(joined.status, MergeStatus::Incomparable);
//! ```
//!
//! ## Core Components
//!
//! - **[`smg`]**: the graph store and its invariants.
//! - **[`abstraction`]**: list folding, materialization and concretization.
//! - **[`join`]**: entailment and join.
//! - **[`merge`]**: the merge operator called by the exploration framework.

pub mod abstraction;
pub mod debug;
pub mod edge;
pub mod error;
pub mod export;
pub mod information;
pub mod interrupt;
pub mod join;
pub mod merge;
pub mod object;
pub mod smg;
pub mod spc;
pub mod state;
pub mod status;
pub mod types;
pub mod value;
