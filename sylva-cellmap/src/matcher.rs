//! Structural pattern matching against subject-graph cones.

use crate::{Cut, PatNode, PatNodeKind, PatternGraph};
use rustc_hash::FxHashMap;
use sylva_entity::{EntityRef, PackedOption};
use sylva_subject::{Node, SubjectGraph};

/// Walks a pattern graph over a subject cone and reports the polarity of
/// every leaf.
///
/// The matcher owns reusable state: a dense forward map from pattern node
/// to bound subject node (undone through a clear queue after every
/// attempt) and a reverse map enforcing injectivity. After the buffers
/// grow to the largest pattern seen, repeated matches allocate nothing.
/// A failed match leaves no trace.
#[derive(Default)]
pub struct PatMatcher {
    /// Pattern node -> bound subject node.
    sbj_map: Vec<PackedOption<Node>>,
    /// Pattern node -> polarity of the binding.
    inv_map: Vec<bool>,
    /// Pattern nodes bound in the current attempt.
    clear_queue: Vec<PatNode>,
    /// Subject node -> pattern node, for injectivity.
    pat_map: FxHashMap<Node, PatNode>,
}

impl PatMatcher {
    /// Create a matcher with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to embed `pattern` into the cone of `graph` rooted at `root`.
    /// On success, fills `cut` with the subject binding of every pattern
    /// input, in pattern-input order, and returns `true`. On failure,
    /// `cut` is left untouched and no matcher state survives.
    pub fn find_match(
        &mut self,
        graph: &SubjectGraph,
        root: Node,
        pattern: &PatternGraph,
        cut: &mut Cut,
    ) -> bool {
        match pattern.kind(pattern.root()) {
            // An input root matches anything.
            PatNodeKind::Input => {}
            PatNodeKind::And => {
                if !graph.is_and(root) {
                    return false;
                }
            }
            PatNodeKind::Xor => {
                if !graph.is_xor(root) {
                    return false;
                }
            }
        }
        if self.sbj_map.len() < pattern.node_num() {
            self.sbj_map.resize(pattern.node_num(), Default::default());
            self.inv_map.resize(pattern.node_num(), false);
        }

        let ok = self.walk_edges(graph, root, pattern);
        if ok {
            cut.clear();
            for pos in 0..pattern.input_num() {
                let leaf = pattern.input(pos);
                cut.push_leaf(
                    self.sbj_map[leaf.index()].unwrap(),
                    self.inv_map[leaf.index()],
                );
            }
        }

        for &bound in &self.clear_queue {
            self.sbj_map[bound.index()] = Default::default();
            self.inv_map[bound.index()] = false;
        }
        self.clear_queue.clear();
        self.pat_map.clear();

        ok
    }

    fn walk_edges(&mut self, graph: &SubjectGraph, root: Node, pattern: &PatternGraph) -> bool {
        if !self.bind(root, pattern.root(), false) {
            return false;
        }

        for edge in pattern.edges() {
            // Root-down order guarantees the consumer is already bound.
            let to_node = self.sbj_map[edge.to.index()].unwrap();
            debug_assert!(graph.is_logic(to_node));
            let from_node = graph.fanin(to_node, edge.pos);
            let edge_inv = graph.fanin_inv(to_node, edge.pos);

            let inv = match pattern.kind(edge.from) {
                PatNodeKind::Input => {
                    // Leaves absorb polarity: whatever inversion the
                    // pattern edge and the subject edge disagree on
                    // becomes the polarity of the bound leaf.
                    edge.inv ^ edge_inv
                }
                PatNodeKind::And => {
                    if !graph.is_and(from_node) || edge.inv != edge_inv {
                        return false;
                    }
                    false
                }
                PatNodeKind::Xor => {
                    if !graph.is_xor(from_node) || edge.inv != edge_inv {
                        return false;
                    }
                    false
                }
            };
            if !self.bind(from_node, edge.from, inv) {
                return false;
            }
        }
        true
    }

    /// Bind a pattern node to a subject node with a polarity. Fails on a
    /// conflicting rebind in either direction.
    fn bind(&mut self, sbj_node: Node, pat_node: PatNode, inv: bool) -> bool {
        match self.sbj_map[pat_node.index()].expand() {
            Some(bound) => {
                if bound != sbj_node || self.inv_map[pat_node.index()] != inv {
                    return false;
                }
            }
            None => {
                self.sbj_map[pat_node.index()] = sbj_node.into();
                self.inv_map[pat_node.index()] = inv;
                self.clear_queue.push(pat_node);
            }
        }

        match self.pat_map.get(&sbj_node) {
            Some(&bound) => bound == pat_node,
            None => {
                self.pat_map.insert(sbj_node, pat_node);
                true
            }
        }
    }
}
