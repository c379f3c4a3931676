//! Technology-independent subject graphs.
//!
//! A subject graph is the structural target that factored expressions are
//! lowered onto before technology mapping: a network whose only logic
//! nodes are two-input ANDs (with per-fanin complement flags) and
//! two-input XORs (with the complement carried on the consuming handle),
//! plus input nodes, output nodes, D-flip-flops and latches. Inverters
//! never exist as nodes; polarity travels on [`Handle`]s and edge flags,
//! so structurally identical cones stay shared regardless of polarity.
//!
//! Construction is incremental and normalizing: the `new_*` builders fold
//! constants, collapse the immediate `x & !x` style contradictions, lower
//! OR to AND by De Morgan, and build wide operators as balanced trees so
//! depth-sensitive consumers (LUT mappers) see ⌈log₂ n⌉ levels.
//!
//! The graph supports deterministic topological and reverse-topological
//! traversal of its logic nodes, a lazily cached level (critical path)
//! computation, and the k-LUT minimum-depth analysis in [`depth`].

#![deny(missing_docs)]

mod depth;
mod graph;
mod handle;

pub use self::depth::DepthMap;
pub use self::graph::{DffData, LatchData, LogicFunc, PortData, SubjectGraph};
pub use self::handle::Handle;

use sylva_entity::entity_impl;
use thiserror::Error;

/// An opaque reference to a node in a [`SubjectGraph`].
///
/// Ids are dense, stable while the node is alive, and recycled by later
/// allocations once the node is deleted.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(u32);
entity_impl!(Node, "n");

/// An opaque reference to a named port of a [`SubjectGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u32);
entity_impl!(Port, "port");

/// An opaque reference to a D-flip-flop of a [`SubjectGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dff(u32);
entity_impl!(Dff, "dff");

/// An opaque reference to a latch of a [`SubjectGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Latch(u32);
entity_impl!(Latch, "latch");

/// Errors from subject-graph construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node can belong to at most one port bit.
    #[error("node {node} is already bound to a port")]
    PortRebind {
        /// The node for which rebinding was attempted.
        node: Node,
    },
    /// Ports are made of input and output nodes only.
    #[error("node {node} is not an input or output node")]
    NotIoNode {
        /// The offending node.
        node: Node,
    },
}
