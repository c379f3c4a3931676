//! Cuts and the precomputed mapping record.

use crate::CellId;
use smallvec::SmallVec;
use sylva_entity::{PackedOption, SecondaryMap};
use sylva_subject::{Dff, Node};

/// The leaf bindings of one matched pattern: the subject signals, in
/// pattern-input order, that become the cell's input pins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cut {
    leaves: SmallVec<[(Node, bool); 6]>,
}

impl Cut {
    /// An empty cut.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all leaves.
    pub fn clear(&mut self) {
        self.leaves.clear();
    }

    /// Append a leaf.
    pub fn push_leaf(&mut self, node: Node, inv: bool) {
        self.leaves.push((node, inv));
    }

    /// Number of leaves.
    pub fn leaf_num(&self) -> usize {
        self.leaves.len()
    }

    /// The `pos`-th leaf node.
    pub fn leaf_node(&self, pos: usize) -> Node {
        self.leaves[pos].0
    }

    /// The polarity of the `pos`-th leaf.
    pub fn leaf_inv(&self, pos: usize) -> bool {
        self.leaves[pos].1
    }

    /// All leaves in order.
    pub fn leaves(&self) -> impl Iterator<Item = (Node, bool)> + '_ {
        self.leaves.iter().copied()
    }
}

#[derive(Clone, Debug)]
struct MatchEntry {
    cell: CellId,
    cut: Cut,
}

/// The output of a technology-mapping pass, as the generator consumes it:
/// for each representative `(node, polarity)` the chosen cell and cut,
/// for each flip-flop the chosen cells per output polarity, and the cells
/// implementing the two constants.
#[derive(Clone, Debug, Default)]
pub struct MapRecord {
    matches: SecondaryMap<Node, [Option<MatchEntry>; 2]>,
    dff_cells: SecondaryMap<Dff, [PackedOption<CellId>; 2]>,
    const0: PackedOption<CellId>,
    const1: PackedOption<CellId>,
}

impl MapRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose `cell`, reached through `cut`, for `node` under polarity
    /// `inv`.
    pub fn set_match(&mut self, node: Node, inv: bool, cell: CellId, cut: Cut) {
        self.matches[node][inv as usize] = Some(MatchEntry { cell, cut });
    }

    /// The chosen cell and cut for `(node, inv)`, if any.
    pub fn node_match(&self, node: Node, inv: bool) -> Option<(CellId, &Cut)> {
        self.matches[node][inv as usize]
            .as_ref()
            .map(|entry| (entry.cell, &entry.cut))
    }

    /// Choose the flip-flop cell producing `dff`'s output with polarity
    /// `inv`.
    pub fn set_dff_cell(&mut self, dff: Dff, inv: bool, cell: CellId) {
        self.dff_cells[dff][inv as usize] = cell.into();
    }

    /// The flip-flop cell for `(dff, inv)`, if chosen.
    pub fn dff_cell(&self, dff: Dff, inv: bool) -> Option<CellId> {
        self.dff_cells[dff][inv as usize].expand()
    }

    /// Choose the cell that emits constant 0.
    pub fn set_const0_cell(&mut self, cell: CellId) {
        self.const0 = cell.into();
    }

    /// The constant-0 cell, if chosen.
    pub fn const0_cell(&self) -> Option<CellId> {
        self.const0.expand()
    }

    /// Choose the cell that emits constant 1.
    pub fn set_const1_cell(&mut self, cell: CellId) {
        self.const1 = cell.into();
    }

    /// The constant-1 cell, if chosen.
    pub fn const1_cell(&self) -> Option<CellId> {
        self.const1.expand()
    }
}
