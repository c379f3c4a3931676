//! Minimum depth under k-input LUT decomposition.

use crate::{Node, SubjectGraph};
use smallvec::SmallVec;
use sylva_entity::{EntityRef, SecondaryMap};

/// Result of a [`SubjectGraph::min_depth`] analysis: a dense per-node
/// depth vector and the maximum over all output drivers.
#[derive(Clone, Debug)]
pub struct DepthMap {
    depths: SecondaryMap<Node, u32>,
    max: u32,
}

impl DepthMap {
    /// The depth of `node`. Inputs are at depth 0.
    pub fn depth(&self, node: Node) -> u32 {
        self.depths[node]
    }

    /// The maximum depth over all output drivers.
    pub fn max_depth(&self) -> u32 {
        self.max
    }
}

impl SubjectGraph {
    /// For every logic node, the minimum combinational depth achievable
    /// when its fanin cone is packed into LUTs of at most `k` inputs.
    ///
    /// A node whose whole cone reads at most `k` distinct inputs can share
    /// a LUT with its fanins, so it stays at their depth (at least 1, the
    /// LUT it occupies); otherwise it starts a new LUT one level deeper.
    /// With `k = 2` every LUT holds exactly one node and the result equals
    /// the plain level.
    pub fn min_depth(&self, k: usize) -> DepthMap {
        assert!(k >= 2, "LUTs need at least two inputs");
        let mut depths: SecondaryMap<Node, u32> = SecondaryMap::new();
        let mut seen = vec![false; self.max_node_id()];

        for node in self.sort() {
            let d0 = depths[self.fanin(node, 0)];
            let d1 = depths[self.fanin(node, 1)];
            let fanin_depth = d0.max(d1);
            depths[node] = if self.cone_fits(node, k, &mut seen) {
                fanin_depth.max(1)
            } else {
                fanin_depth + 1
            };
        }

        let mut max = 0;
        for i in 0..self.output_num() {
            if let Some(driver) = self.output_fanin(self.output(i)) {
                max = max.max(depths[driver]);
            }
        }
        log::trace!("min_depth(k={}): {}", k, max);
        DepthMap { depths, max }
    }

    /// Does the fanin cone of `node` read at most `k` distinct inputs?
    /// The DFS aborts as soon as a `k+1`-th input leaf turns up.
    fn cone_fits(&self, node: Node, k: usize, seen: &mut [bool]) -> bool {
        let mut visited: SmallVec<[Node; 16]> = SmallVec::new();
        let mut stack: SmallVec<[Node; 16]> = SmallVec::new();
        let mut leaves = 0usize;
        let mut fits = true;

        seen[node.index()] = true;
        visited.push(node);
        stack.push(node);
        'walk: while let Some(n) = stack.pop() {
            for pos in 0..2 {
                let fanin = self.fanin(n, pos);
                if seen[fanin.index()] {
                    continue;
                }
                seen[fanin.index()] = true;
                visited.push(fanin);
                if self.is_logic(fanin) {
                    stack.push(fanin);
                } else {
                    leaves += 1;
                    if leaves > k {
                        fits = false;
                        break 'walk;
                    }
                }
            }
        }

        for n in visited {
            seen[n.index()] = false;
        }
        fits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Handle;

    #[test]
    fn chain_versus_tree() {
        // A 4-input chain: depth shrinks as k grows.
        let mut g = SubjectGraph::new();
        let hs: Vec<Handle> = (0..4)
            .map(|_| Handle::new(g.new_input(), false))
            .collect();
        let n1 = g.new_and2(hs[0], hs[1]);
        let n2 = g.new_and2(n1, hs[2]);
        let n3 = g.new_and2(n2, hs[3]);
        g.new_output(n3);

        assert_eq!(g.level(), 3);
        let d2 = g.min_depth(2);
        assert_eq!(d2.max_depth(), 3);
        assert_eq!(d2.depth(n1.node().unwrap()), 1);
        assert_eq!(d2.depth(n2.node().unwrap()), 2);

        let d4 = g.min_depth(4);
        assert_eq!(d4.max_depth(), 1);

        let d3 = g.min_depth(3);
        assert_eq!(d3.depth(n2.node().unwrap()), 1);
        assert_eq!(d3.max_depth(), 2);
    }

    #[test]
    fn k2_equals_level() {
        let mut g = SubjectGraph::new();
        let hs: Vec<Handle> = (0..6)
            .map(|_| Handle::new(g.new_input(), false))
            .collect();
        let x = g.new_and(&hs[..3]);
        let y = g.new_xor(&hs[3..]);
        let root = g.new_or2(x, y);
        g.new_output(root);

        let levels = g.level();
        let d = g.min_depth(2);
        assert_eq!(d.max_depth(), levels);
        for node in g.sort() {
            assert_eq!(d.depth(node), g.node_level(node));
        }
    }

    #[test]
    fn bounded_by_level() {
        let mut g = SubjectGraph::new();
        let hs: Vec<Handle> = (0..8)
            .map(|_| Handle::new(g.new_input(), false))
            .collect();
        let root = g.new_and(&hs);
        g.new_output(root);
        let level = g.level();

        for k in 2..=8 {
            let d = g.min_depth(k);
            assert!(d.max_depth() <= level);
            for node in g.sort() {
                assert!(d.depth(node) <= g.node_level(node));
            }
        }
        // All eight inputs fit one 8-LUT.
        assert_eq!(g.min_depth(8).max_depth(), 1);
    }

    #[test]
    fn reconvergence_counts_distinct_inputs() {
        // (a & b) ^ (a & c): five edges but only three distinct inputs.
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let c = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        let ac = g.new_and2(a, c);
        let root = g.new_xor2(ab, ac);
        g.new_output(root);

        let d3 = g.min_depth(3);
        assert_eq!(d3.max_depth(), 1);
        let d2 = g.min_depth(2);
        assert_eq!(d2.max_depth(), 2);
    }
}
