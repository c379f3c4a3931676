//! Library-side read-only data: pattern graphs and cells.

use crate::{CellId, PatNode, PatternId};
use sylva_entity::{EntityRef, PrimaryMap};
use sylva_expr::Expr;

/// The kind of one pattern-graph node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PatNodeKind {
    /// A leaf: matches any subject node, with any polarity.
    Input,
    /// Matches a subject AND node.
    And,
    /// Matches a subject XOR node.
    Xor,
}

/// One pattern edge: `from` is the `pos`-th operand of `to`, complemented
/// if `inv`.
#[derive(Copy, Clone, Debug)]
pub struct PatEdge {
    /// The operand node.
    pub from: PatNode,
    /// The consuming operator node.
    pub to: PatNode,
    /// Which fanin of `to` this edge feeds.
    pub pos: usize,
    /// Polarity mark on the edge.
    pub inv: bool,
}

/// A library pattern: a small DAG of AND/XOR nodes with polarity-marked
/// edges, a distinguished root, and an ordered input list.
///
/// The edge list must be ordered root-down: the `to` node of every edge is
/// either the root or the `from` node of an earlier edge. The matcher
/// relies on this to have a binding for `to` when it reaches the edge.
#[derive(Clone, Debug)]
pub struct PatternGraph {
    nodes: Vec<PatNodeKind>,
    edges: Vec<PatEdge>,
    root: PatNode,
    inputs: Vec<PatNode>,
}

impl PatternGraph {
    /// Assemble a pattern. Debug builds check the root-down edge order
    /// and that `inputs` lists exactly the `Input` nodes.
    pub fn new(
        nodes: Vec<PatNodeKind>,
        edges: Vec<PatEdge>,
        root: PatNode,
        inputs: Vec<PatNode>,
    ) -> Self {
        #[cfg(debug_assertions)]
        {
            let mut bound = vec![false; nodes.len()];
            bound[root.index()] = true;
            for edge in &edges {
                assert!(bound[edge.to.index()], "edge list is not root-down");
                assert!(
                    !matches!(nodes[edge.to.index()], PatNodeKind::Input),
                    "input node with operands"
                );
                bound[edge.from.index()] = true;
            }
            for input in &inputs {
                assert!(matches!(nodes[input.index()], PatNodeKind::Input));
            }
        }
        Self {
            nodes,
            edges,
            root,
            inputs,
        }
    }

    /// Number of pattern nodes.
    pub fn node_num(&self) -> usize {
        self.nodes.len()
    }

    /// The kind of `node`.
    pub fn kind(&self, node: PatNode) -> PatNodeKind {
        self.nodes[node.index()]
    }

    /// The edges, in root-down order.
    pub fn edges(&self) -> &[PatEdge] {
        &self.edges
    }

    /// The root node.
    pub fn root(&self) -> PatNode {
        self.root
    }

    /// Number of pattern inputs.
    pub fn input_num(&self) -> usize {
        self.inputs.len()
    }

    /// The `pos`-th pattern input.
    pub fn input(&self, pos: usize) -> PatNode {
        self.inputs[pos]
    }
}

/// Polarity of a flip-flop control pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sense {
    /// Active high / rising edge.
    Positive,
    /// Active low / falling edge.
    Negative,
}

/// Sequential behavior of a flip-flop cell.
#[derive(Clone, Debug)]
pub struct FFInfo {
    /// Clock edge.
    pub clock: Sense,
    /// Asynchronous clear pin, if the cell has one.
    pub clear: Option<Sense>,
    /// Asynchronous preset pin, if the cell has one.
    pub preset: Option<Sense>,
    /// Does the cell expose a complemented output pin?
    pub complemented_output: bool,
}

/// One library cell.
#[derive(Debug)]
pub struct Cell {
    /// Cell name, as the netlist sink will see it.
    pub name: String,
    /// Number of input pins.
    pub input_num: usize,
    /// The output function over the input pins, when the library provides
    /// one. The mapper itself never evaluates it.
    pub logic: Option<Expr>,
    /// Patterns this cell implements.
    pub patterns: Vec<PatternId>,
    /// Present on flip-flop cells.
    pub ff: Option<FFInfo>,
}

/// A set of cells and the patterns they reference.
#[derive(Debug, Default)]
pub struct CellLibrary {
    cells: PrimaryMap<CellId, Cell>,
    patterns: PrimaryMap<PatternId, PatternGraph>,
}

impl CellLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern.
    pub fn add_pattern(&mut self, pattern: PatternGraph) -> PatternId {
        self.patterns.push(pattern)
    }

    /// Register a cell.
    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        self.cells.push(cell)
    }

    /// Number of cells.
    pub fn cell_num(&self) -> usize {
        self.cells.len()
    }

    /// Look up a cell.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    /// Look up a pattern.
    pub fn pattern(&self, id: PatternId) -> &PatternGraph {
        &self.patterns[id]
    }

    /// Iterate over all cells.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter()
    }

    /// Iterate over all patterns.
    pub fn patterns(&self) -> impl Iterator<Item = (PatternId, &PatternGraph)> {
        self.patterns.iter()
    }
}
