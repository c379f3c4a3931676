//! Structural pattern matching and cell-netlist generation.
//!
//! This crate is the library-aware back half of technology mapping. A
//! cell library supplies read-only [`PatternGraph`]s (small AND/XOR DAG
//! templates with polarity-marked edges) and [`Cell`]s referencing the
//! patterns they implement. The [`PatMatcher`] aligns a pattern against a
//! cone of a subject graph and, on success, emits the [`Cut`] whose leaves
//! are the cell's input bindings. A separately computed [`MapRecord`]
//! assigns a cell and a cut to each representative `(node, polarity)`
//! pair; [`MapGen`] then walks outputs, flip-flops and ports, back-traces
//! through the chosen cuts and emits a gate-level netlist into any
//! [`CellNetwork`] sink, instantiating each `(node, polarity)` at most
//! once and inserting constant cells where an output is tied off.

#![deny(missing_docs)]

mod library;
mod mapgen;
mod matcher;
mod netlist;
mod record;

pub use self::library::{Cell, CellLibrary, FFInfo, PatEdge, PatNodeKind, PatternGraph, Sense};
pub use self::mapgen::MapGen;
pub use self::matcher::PatMatcher;
pub use self::netlist::{CellNetwork, DffPins, NetId, NetKind, Netlist, PortDir};
pub use self::record::{Cut, MapRecord};

use sylva_entity::entity_impl;
use sylva_subject::{Dff, Node};
use thiserror::Error;

/// An opaque reference to a cell in a [`CellLibrary`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);
entity_impl!(CellId, "cell");

/// An opaque reference to a pattern graph in a [`CellLibrary`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(u32);
entity_impl!(PatternId, "pat");

/// An opaque reference to a node of one [`PatternGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatNode(u32);
entity_impl!(PatNode, "p");

/// Errors from netlist generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MapError {
    /// The record has no cell for a `(node, polarity)` the back-trace
    /// reached.
    #[error("no cell recorded for {node} (inverted: {inv})")]
    MissingMatch {
        /// The unmatched subject node.
        node: Node,
        /// The required polarity.
        inv: bool,
    },
    /// The record has no flip-flop cell, in either polarity, for a
    /// subject flip-flop.
    #[error("no cell recorded for flip-flop {dff}")]
    MissingDffCell {
        /// The unmapped flip-flop.
        dff: Dff,
    },
    /// An output is tied to a constant but the record carries no cell for
    /// that constant.
    #[error("no constant cell recorded for value {value}")]
    MissingConstCell {
        /// The constant value needed.
        value: bool,
    },
    /// Latch mapping is not implemented; graphs with latches are
    /// rejected.
    #[error("subject graph contains latches")]
    LatchesUnsupported,
}
