//! The subject graph itself.

use crate::{Dff, GraphError, Handle, Latch, Node, Port};
use smallvec::SmallVec;
use sylva_entity::{EntityRef, IdPool, PackedOption, PrimaryMap, SecondaryMap};
use sylva_expr::{Expr, ExprMgr, ExprView};

/// The logic function of a logic node.
///
/// OR does not exist as a node kind: `new_or2` lowers it to an AND of
/// complements and complements the returned handle. XOR polarity is not
/// part of the function either; it rides on the consuming handles, so XOR
/// and XNOR share one node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicFunc {
    /// Two-input AND with per-fanin complement flags.
    And {
        /// Complement the first fanin.
        inv0: bool,
        /// Complement the second fanin.
        inv1: bool,
    },
    /// Two-input XOR.
    Xor,
}

impl LogicFunc {
    /// The complement flag on the `pos`-th fanin edge.
    pub fn fanin_inv(self, pos: usize) -> bool {
        match self {
            LogicFunc::And { inv0, inv1 } => {
                debug_assert!(pos < 2);
                if pos == 0 {
                    inv0
                } else {
                    inv1
                }
            }
            LogicFunc::Xor => false,
        }
    }
}

/// A back reference from a node to one fanin edge of a consumer.
#[derive(Copy, Clone, Debug)]
struct FanoutRef {
    to: Node,
    pos: u8,
}

#[derive(Clone, Debug)]
enum NodeData {
    /// A recycled slot.
    Free,
    Input {
        subid: u32,
    },
    Output {
        subid: u32,
        fanin: PackedOption<Node>,
        inv: bool,
    },
    Logic {
        func: LogicFunc,
        fanins: [Node; 2],
    },
}

/// A named, ordered bundle of input and output nodes.
#[derive(Clone, Debug)]
pub struct PortData {
    name: String,
    bits: Vec<Node>,
}

impl PortData {
    /// The port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bits.
    pub fn bit_width(&self) -> usize {
        self.bits.len()
    }

    /// The node carrying bit `pos`.
    pub fn bit(&self, pos: usize) -> Node {
        self.bits[pos]
    }

    /// All bits in order.
    pub fn bits(&self) -> &[Node] {
        &self.bits
    }
}

/// A D-flip-flop: an aggregate of boundary nodes with no combinational
/// meaning. The data output drives logic, so it is an input node; the
/// data input, clock, clear and preset terminate cones, so they are
/// output nodes.
#[derive(Clone, Debug)]
pub struct DffData {
    input: Node,
    output: Node,
    clock: Node,
    clear: PackedOption<Node>,
    preset: PackedOption<Node>,
}

impl DffData {
    /// The data input (an output node).
    pub fn data_input(&self) -> Node {
        self.input
    }

    /// The data output (an input node).
    pub fn data_output(&self) -> Node {
        self.output
    }

    /// The clock (an output node).
    pub fn clock(&self) -> Node {
        self.clock
    }

    /// The asynchronous clear, if connected.
    pub fn clear(&self) -> Option<Node> {
        self.clear.expand()
    }

    /// The asynchronous preset, if connected.
    pub fn preset(&self) -> Option<Node> {
        self.preset.expand()
    }
}

/// A level-sensitive latch, the same shape as a [`DffData`] with an
/// enable in place of the clock.
#[derive(Clone, Debug)]
pub struct LatchData {
    input: Node,
    output: Node,
    enable: Node,
}

impl LatchData {
    /// The data input (an output node).
    pub fn data_input(&self) -> Node {
        self.input
    }

    /// The data output (an input node).
    pub fn data_output(&self) -> Node {
        self.output
    }

    /// The enable (an output node).
    pub fn enable(&self) -> Node {
        self.enable
    }
}

/// Which port, and which bit of it, an input or output node belongs to.
#[derive(Clone, Default)]
struct PortSlot {
    port: PackedOption<Port>,
    bit: u32,
}

/// A 2-input AND/XOR network with inputs, outputs, flip-flops and latches.
#[derive(Clone, Default)]
pub struct SubjectGraph {
    name: String,
    nodes: Vec<NodeData>,
    ids: IdPool<Node>,
    fanouts: SecondaryMap<Node, Vec<FanoutRef>>,
    po_mark: SecondaryMap<Node, bool>,
    inputs: Vec<Node>,
    outputs: Vec<Node>,
    input_ports: Vec<PortSlot>,
    output_ports: Vec<PortSlot>,
    ports: PrimaryMap<Port, PortData>,
    dffs: PrimaryMap<Dff, DffData>,
    latches: PrimaryMap<Latch, LatchData>,
    logic_count: usize,
    levels: SecondaryMap<Node, u32>,
    level: u32,
    level_valid: bool,
}

impl SubjectGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the graph name.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Remove every node, port, flip-flop and latch.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.ids.clear();
        self.fanouts.clear();
        self.po_mark.clear();
        self.inputs.clear();
        self.outputs.clear();
        self.input_ports.clear();
        self.output_ports.clear();
        self.ports.clear();
        self.dffs.clear();
        self.latches.clear();
        self.logic_count = 0;
        self.levels.clear();
        self.level = 0;
        self.level_valid = false;
    }

    //
    // Node queries.
    //

    /// One past the largest node id ever allocated; side tables indexed by
    /// node id should be sized to this.
    pub fn max_node_id(&self) -> usize {
        self.nodes.len()
    }

    /// Number of input nodes.
    pub fn input_num(&self) -> usize {
        self.inputs.len()
    }

    /// The `subid`-th input node.
    pub fn input(&self, subid: usize) -> Node {
        self.inputs[subid]
    }

    /// Number of output nodes.
    pub fn output_num(&self) -> usize {
        self.outputs.len()
    }

    /// The `subid`-th output node.
    pub fn output(&self, subid: usize) -> Node {
        self.outputs[subid]
    }

    /// Number of live logic nodes.
    pub fn logic_num(&self) -> usize {
        self.logic_count
    }

    fn data(&self, node: Node) -> &NodeData {
        let data = &self.nodes[node.index()];
        debug_assert!(!matches!(data, NodeData::Free), "node used after delete");
        data
    }

    /// Is `node` an input node?
    pub fn is_input(&self, node: Node) -> bool {
        matches!(self.data(node), NodeData::Input { .. })
    }

    /// Is `node` an output node?
    pub fn is_output(&self, node: Node) -> bool {
        matches!(self.data(node), NodeData::Output { .. })
    }

    /// Is `node` a logic node?
    pub fn is_logic(&self, node: Node) -> bool {
        matches!(self.data(node), NodeData::Logic { .. })
    }

    /// Is `node` an AND node?
    pub fn is_and(&self, node: Node) -> bool {
        matches!(
            self.data(node),
            NodeData::Logic {
                func: LogicFunc::And { .. },
                ..
            }
        )
    }

    /// Is `node` an XOR node?
    pub fn is_xor(&self, node: Node) -> bool {
        matches!(
            self.data(node),
            NodeData::Logic {
                func: LogicFunc::Xor,
                ..
            }
        )
    }

    /// Position of an input or output node in its kind's list.
    pub fn subid(&self, node: Node) -> usize {
        match self.data(node) {
            NodeData::Input { subid } | NodeData::Output { subid, .. } => *subid as usize,
            NodeData::Logic { .. } | NodeData::Free => panic!("subid() on a logic node"),
        }
    }

    /// The logic function of a logic node.
    pub fn func(&self, node: Node) -> LogicFunc {
        match self.data(node) {
            NodeData::Logic { func, .. } => *func,
            _ => panic!("func() on a non-logic node"),
        }
    }

    /// The `pos`-th fanin of a logic node.
    pub fn fanin(&self, node: Node, pos: usize) -> Node {
        match self.data(node) {
            NodeData::Logic { fanins, .. } => fanins[pos],
            _ => panic!("fanin() on a non-logic node"),
        }
    }

    /// The complement flag on the `pos`-th fanin edge of a logic node.
    pub fn fanin_inv(&self, node: Node, pos: usize) -> bool {
        self.func(node).fanin_inv(pos)
    }

    /// The `pos`-th fanin of a logic node as a polarity-carrying handle.
    pub fn fanin_handle(&self, node: Node, pos: usize) -> Handle {
        Handle::new(self.fanin(node, pos), self.fanin_inv(node, pos))
    }

    /// The driver of an output node, if any.
    pub fn output_fanin(&self, node: Node) -> Option<Node> {
        match self.data(node) {
            NodeData::Output { fanin, .. } => fanin.expand(),
            _ => panic!("output_fanin() on a non-output node"),
        }
    }

    /// The complement flag on an output node's fanin.
    pub fn output_fanin_inv(&self, node: Node) -> bool {
        match self.data(node) {
            NodeData::Output { inv, .. } => *inv,
            _ => panic!("output_fanin_inv() on a non-output node"),
        }
    }

    /// Number of fanin edges referencing `node`.
    pub fn fanout_num(&self, node: Node) -> usize {
        self.fanouts[node].len()
    }

    /// The `pos`-th fanout edge of `node` as `(consumer, fanin position)`.
    pub fn fanout(&self, node: Node, pos: usize) -> (Node, usize) {
        let fr = self.fanouts[node][pos];
        (fr.to, fr.pos as usize)
    }

    /// Does some fanout of `node` feed an output node directly?
    pub fn is_po_reachable(&self, node: Node) -> bool {
        self.po_mark[node]
    }

    /// Short display form: `I3` for inputs, `O1` for outputs, `L7` for
    /// logic nodes.
    pub fn id_str(&self, node: Node) -> String {
        let tag = match self.data(node) {
            NodeData::Input { .. } => 'I',
            NodeData::Output { .. } => 'O',
            NodeData::Logic { .. } => 'L',
            NodeData::Free => 'X',
        };
        format!("{}{}", tag, node.index())
    }

    //
    // Construction.
    //

    fn alloc_node(&mut self, data: NodeData) -> Node {
        let node = self.ids.take();
        if node.index() == self.nodes.len() {
            self.nodes.push(data);
        } else {
            debug_assert!(matches!(self.nodes[node.index()], NodeData::Free));
            self.nodes[node.index()] = data;
        }
        self.fanouts[node].clear();
        self.po_mark[node] = false;
        node
    }

    /// Record the fanin edge `(from, to, pos)` in `from`'s fanout list.
    fn link(&mut self, from: Node, to: Node, pos: usize) {
        let is_output = self.is_output(to);
        self.fanouts[from].push(FanoutRef {
            to,
            pos: pos as u8,
        });
        if is_output {
            self.po_mark[from] = true;
        }
        self.level_valid = false;
    }

    /// Drop every fanout record of `from` pointing at `to` and refresh the
    /// output-reach mark.
    fn unlink(&mut self, from: Node, to: Node) {
        self.fanouts[from].retain(|fr| fr.to != to);
        let reaches = self.fanouts[from]
            .iter()
            .any(|fr| matches!(self.nodes[fr.to.index()], NodeData::Output { .. }));
        self.po_mark[from] = reaches;
        self.level_valid = false;
    }

    /// Create a fresh input node.
    pub fn new_input(&mut self) -> Node {
        let subid = self.inputs.len() as u32;
        let node = self.alloc_node(NodeData::Input { subid });
        self.inputs.push(node);
        self.input_ports.push(PortSlot::default());
        self.levels[node] = 0;
        node
    }

    /// Create a fresh output node driven by `h`. A constant handle leaves
    /// the fanin empty; the polarity distinguishes tied-low from tied-high.
    pub fn new_output(&mut self, h: Handle) -> Node {
        let subid = self.outputs.len() as u32;
        let node = self.alloc_node(NodeData::Output {
            subid,
            fanin: h.node().into(),
            inv: h.inv(),
        });
        self.outputs.push(node);
        self.output_ports.push(PortSlot::default());
        if let Some(from) = h.node() {
            self.link(from, node, 0);
        }
        self.level_valid = false;
        node
    }

    /// Rewire an output node to a new driver.
    pub fn change_output(&mut self, node: Node, h: Handle) {
        let old = self.output_fanin(node);
        if let Some(old) = old {
            self.unlink(old, node);
        }
        match &mut self.nodes[node.index()] {
            NodeData::Output { fanin, inv, .. } => {
                *fanin = h.node().into();
                *inv = h.inv();
            }
            _ => panic!("change_output() on a non-output node"),
        }
        if let Some(from) = h.node() {
            self.link(from, node, 0);
        }
        self.level_valid = false;
    }

    fn new_logic_node(&mut self, func: LogicFunc, f0: Node, f1: Node) -> Node {
        let node = self.alloc_node(NodeData::Logic {
            func,
            fanins: [f0, f1],
        });
        self.logic_count += 1;
        self.link(f0, node, 0);
        self.link(f1, node, 1);
        node
    }

    /// Two-input AND. Folds constants and the immediate duplicate and
    /// contradiction cases; otherwise the result handle is plain (any
    /// complements are absorbed into the node's function code).
    pub fn new_and2(&mut self, h1: Handle, h2: Handle) -> Handle {
        if h1.is_const0() || h2.is_const0() {
            return Handle::zero();
        }
        if h1.is_const1() {
            return h2;
        }
        if h2.is_const1() {
            return h1;
        }
        if h1 == h2 {
            return h1;
        }
        if h1 == !h2 {
            return Handle::zero();
        }
        let func = LogicFunc::And {
            inv0: h1.inv(),
            inv1: h2.inv(),
        };
        let node = self.new_logic_node(func, h1.node().unwrap(), h2.node().unwrap());
        Handle::new(node, false)
    }

    /// Two-input OR, lowered to an AND of complements with a complemented
    /// result handle.
    pub fn new_or2(&mut self, h1: Handle, h2: Handle) -> Handle {
        if h1.is_const0() {
            return h2;
        }
        if h2.is_const0() {
            return h1;
        }
        if h1.is_const1() || h2.is_const1() {
            return Handle::one();
        }
        if h1 == h2 {
            return h1;
        }
        if h1 == !h2 {
            return Handle::one();
        }
        let func = LogicFunc::And {
            inv0: !h1.inv(),
            inv1: !h2.inv(),
        };
        let node = self.new_logic_node(func, h1.node().unwrap(), h2.node().unwrap());
        Handle::new(node, true)
    }

    /// Two-input XOR. The operand complements cancel into the parity of
    /// the returned handle, so XOR and XNOR of the same signals share one
    /// node.
    pub fn new_xor2(&mut self, h1: Handle, h2: Handle) -> Handle {
        if h1.is_const0() {
            return h2;
        }
        if h1.is_const1() {
            return !h2;
        }
        if h2.is_const0() {
            return h1;
        }
        if h2.is_const1() {
            return !h1;
        }
        if h1 == h2 {
            return Handle::zero();
        }
        if h1 == !h2 {
            return Handle::one();
        }
        let inv = h1.inv() ^ h2.inv();
        let node = self.new_logic_node(LogicFunc::Xor, h1.node().unwrap(), h2.node().unwrap());
        Handle::new(node, inv)
    }

    /// Wide AND over any number of signals: constants fold away, and the
    /// survivors are combined in a balanced tree. An empty list gives 1.
    pub fn new_and(&mut self, hs: &[Handle]) -> Handle {
        let mut live: SmallVec<[Handle; 8]> = SmallVec::new();
        for &h in hs {
            if h.is_const0() {
                return Handle::zero();
            }
            if !h.is_const1() {
                live.push(h);
            }
        }
        if live.is_empty() {
            return Handle::one();
        }
        self.and_tree(&live)
    }

    fn and_tree(&mut self, hs: &[Handle]) -> Handle {
        debug_assert!(!hs.is_empty());
        if hs.len() == 1 {
            return hs[0];
        }
        let half = hs.len() / 2;
        let l = self.and_tree(&hs[..half]);
        let r = self.and_tree(&hs[half..]);
        self.new_and2(l, r)
    }

    /// Wide OR; the dual of [`new_and`](Self::new_and). An empty list
    /// gives 0.
    pub fn new_or(&mut self, hs: &[Handle]) -> Handle {
        let mut live: SmallVec<[Handle; 8]> = SmallVec::new();
        for &h in hs {
            if h.is_const1() {
                return Handle::one();
            }
            if !h.is_const0() {
                live.push(h);
            }
        }
        if live.is_empty() {
            return Handle::zero();
        }
        self.or_tree(&live)
    }

    fn or_tree(&mut self, hs: &[Handle]) -> Handle {
        debug_assert!(!hs.is_empty());
        if hs.len() == 1 {
            return hs[0];
        }
        let half = hs.len() / 2;
        let l = self.or_tree(&hs[..half]);
        let r = self.or_tree(&hs[half..]);
        self.new_or2(l, r)
    }

    /// Wide XOR: constant 1 operands toggle the overall parity, constant 0
    /// operands vanish, the rest builds a balanced tree. An empty list
    /// gives 0.
    pub fn new_xor(&mut self, hs: &[Handle]) -> Handle {
        let mut live: SmallVec<[Handle; 8]> = SmallVec::new();
        let mut inv = false;
        for &h in hs {
            if h.is_const1() {
                inv = !inv;
            } else if !h.is_const0() {
                live.push(h);
            }
        }
        if live.is_empty() {
            return Handle::zero().xor_inv(inv);
        }
        if inv {
            live[0] = !live[0];
        }
        self.xor_tree(&live)
    }

    fn xor_tree(&mut self, hs: &[Handle]) -> Handle {
        debug_assert!(!hs.is_empty());
        if hs.len() == 1 {
            return hs[0];
        }
        let half = hs.len() / 2;
        let l = self.xor_tree(&hs[..half]);
        let r = self.xor_tree(&hs[half..]);
        self.new_xor2(l, r)
    }

    /// Lower a factored expression to graph structure. `leaves[v]` is the
    /// signal standing in for variable `v`; constants fold through.
    pub fn new_logic(&mut self, mgr: &ExprMgr, expr: &Expr, leaves: &[Handle]) -> Handle {
        self.expr_to_graph(mgr, expr.id(), leaves)
    }

    fn expr_to_graph(
        &mut self,
        mgr: &ExprMgr,
        id: sylva_expr::ExprId,
        leaves: &[Handle],
    ) -> Handle {
        match mgr.view(id) {
            ExprView::Const0 => Handle::zero(),
            ExprView::Const1 => Handle::one(),
            ExprView::PosLit(v) => leaves[v.index()],
            ExprView::NegLit(v) => !leaves[v.index()],
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                let children: SmallVec<[sylva_expr::ExprId; 8]> = SmallVec::from_slice(c);
                let hs: SmallVec<[Handle; 8]> = children
                    .iter()
                    .map(|&c| self.expr_to_graph(mgr, c, leaves))
                    .collect();
                match mgr.view(id) {
                    ExprView::And(_) => self.new_and(&hs),
                    ExprView::Or(_) => self.new_or(&hs),
                    _ => self.new_xor(&hs),
                }
            }
        }
    }

    /// Delete a logic node. Panics if anything still consumes it.
    pub fn delete_logic(&mut self, node: Node) {
        assert!(self.is_logic(node), "delete_logic() on a non-logic node");
        assert!(
            self.fanouts[node].is_empty(),
            "deleted a logic node that still has fanout"
        );
        let [f0, f1] = match self.data(node) {
            NodeData::Logic { fanins, .. } => *fanins,
            _ => unreachable!(),
        };
        self.unlink(f0, node);
        if f1 != f0 {
            self.unlink(f1, node);
        }
        self.nodes[node.index()] = NodeData::Free;
        self.ids.release(node);
        self.logic_count -= 1;
        self.level_valid = false;
    }

    //
    // Flip-flops and latches.
    //

    /// Register a D-flip-flop over the given boundary nodes.
    pub fn new_dff(
        &mut self,
        input: Node,
        output: Node,
        clock: Node,
        clear: Option<Node>,
        preset: Option<Node>,
    ) -> Dff {
        debug_assert!(self.is_output(input) && self.is_output(clock));
        debug_assert!(self.is_input(output));
        self.dffs.push(DffData {
            input,
            output,
            clock,
            clear: clear.into(),
            preset: preset.into(),
        })
    }

    /// Number of flip-flops.
    pub fn dff_num(&self) -> usize {
        self.dffs.len()
    }

    /// The `i`-th flip-flop.
    pub fn dff(&self, dff: Dff) -> &DffData {
        &self.dffs[dff]
    }

    /// Iterate over all flip-flops.
    pub fn dffs(&self) -> impl Iterator<Item = (Dff, &DffData)> {
        self.dffs.iter()
    }

    /// Register a latch over the given boundary nodes.
    pub fn new_latch(&mut self, input: Node, output: Node, enable: Node) -> Latch {
        debug_assert!(self.is_output(input) && self.is_output(enable));
        debug_assert!(self.is_input(output));
        self.latches.push(LatchData {
            input,
            output,
            enable,
        })
    }

    /// Number of latches.
    pub fn latch_num(&self) -> usize {
        self.latches.len()
    }

    /// The `i`-th latch.
    pub fn latch(&self, latch: Latch) -> &LatchData {
        &self.latches[latch]
    }

    /// Iterate over all latches.
    pub fn latches(&self) -> impl Iterator<Item = (Latch, &LatchData)> {
        self.latches.iter()
    }

    //
    // Ports.
    //

    /// Bind the given input/output nodes as the bits of a named port.
    /// Every node can belong to at most one port bit.
    pub fn add_port(&mut self, name: &str, bits: Vec<Node>) -> Result<Port, GraphError> {
        for &node in &bits {
            let slot = self.port_slot(node)?;
            if slot.port.is_some() {
                return Err(GraphError::PortRebind { node });
            }
        }
        let port = self.ports.push(PortData {
            name: name.to_string(),
            bits,
        });
        let bits = self.ports[port].bits.clone();
        for (pos, node) in bits.into_iter().enumerate() {
            let slot = self.port_slot_mut(node);
            slot.port = port.into();
            slot.bit = pos as u32;
        }
        Ok(port)
    }

    fn port_slot(&self, node: Node) -> Result<&PortSlot, GraphError> {
        match self.data(node) {
            NodeData::Input { subid } => Ok(&self.input_ports[*subid as usize]),
            NodeData::Output { subid, .. } => Ok(&self.output_ports[*subid as usize]),
            _ => Err(GraphError::NotIoNode { node }),
        }
    }

    fn port_slot_mut(&mut self, node: Node) -> &mut PortSlot {
        match &self.nodes[node.index()] {
            NodeData::Input { subid } => &mut self.input_ports[*subid as usize],
            NodeData::Output { subid, .. } => &mut self.output_ports[*subid as usize],
            _ => unreachable!("checked by add_port"),
        }
    }

    /// Number of ports.
    pub fn port_num(&self) -> usize {
        self.ports.len()
    }

    /// Port contents.
    pub fn port(&self, port: Port) -> &PortData {
        &self.ports[port]
    }

    /// Iterate over all ports.
    pub fn ports(&self) -> impl Iterator<Item = (Port, &PortData)> {
        self.ports.iter()
    }

    /// The port and bit position of an input/output node, if bound.
    pub fn port_of(&self, node: Node) -> Option<(Port, usize)> {
        let slot = self.port_slot(node).ok()?;
        slot.port.expand().map(|p| (p, slot.bit as usize))
    }

    //
    // Traversal.
    //

    /// Logic nodes in topological order: every fanin of an emitted node
    /// was emitted (or is an input) before it. Nodes becoming ready in
    /// the same step are emitted in ascending id order, so the order is
    /// deterministic.
    pub fn sort(&self) -> Vec<Node> {
        let mut order = Vec::with_capacity(self.logic_count);
        let mut marked = vec![false; self.max_node_id()];

        for &input in &self.inputs {
            marked[input.index()] = true;
        }
        for &input in &self.inputs {
            self.sort_visit(input, &mut marked, &mut order);
        }
        let mut rpos = 0;
        while rpos < order.len() {
            let node = order[rpos];
            rpos += 1;
            self.sort_visit(node, &mut marked, &mut order);
        }
        debug_assert_eq!(order.len(), self.logic_count);
        log::trace!("sort: {} logic nodes", order.len());
        order
    }

    /// Append every fanout consumer of `node` whose fanins are all marked.
    fn sort_visit(&self, node: Node, marked: &mut [bool], order: &mut Vec<Node>) {
        let mut ready: SmallVec<[Node; 8]> = SmallVec::new();
        for fr in &self.fanouts[node] {
            let consumer = fr.to;
            if marked[consumer.index()] || !self.is_logic(consumer) {
                continue;
            }
            let ok = (0..2).all(|pos| marked[self.fanin(consumer, pos).index()]);
            if ok {
                ready.push(consumer);
            }
        }
        ready.sort_unstable();
        for consumer in ready {
            if !marked[consumer.index()] {
                marked[consumer.index()] = true;
                order.push(consumer);
            }
        }
    }

    /// Logic nodes in reverse topological order: every fanout consumer of
    /// an emitted node was emitted (or is an output) before it. As with
    /// [`sort`](Self::sort), ties resolve in ascending id order.
    pub fn rsort(&self) -> Vec<Node> {
        let mut order = Vec::with_capacity(self.logic_count);
        let mut marked = vec![false; self.max_node_id()];

        for &output in &self.outputs {
            marked[output.index()] = true;
        }
        for &output in &self.outputs {
            self.rsort_visit(output, &mut marked, &mut order);
        }
        let mut rpos = 0;
        while rpos < order.len() {
            let node = order[rpos];
            rpos += 1;
            self.rsort_visit(node, &mut marked, &mut order);
        }
        debug_assert_eq!(order.len(), self.logic_count);
        order
    }

    /// Append every fanin of `node` whose fanout consumers are all marked.
    fn rsort_visit(&self, node: Node, marked: &mut [bool], order: &mut Vec<Node>) {
        let fanins: SmallVec<[Node; 2]> = match self.data(node) {
            NodeData::Logic { fanins, .. } => SmallVec::from_slice(fanins),
            NodeData::Output { fanin, .. } => fanin.expand().into_iter().collect(),
            _ => return,
        };
        let mut ready: SmallVec<[Node; 2]> = SmallVec::new();
        for &producer in &fanins {
            if marked[producer.index()] || !self.is_logic(producer) {
                continue;
            }
            let ok = self.fanouts[producer]
                .iter()
                .all(|fr| marked[fr.to.index()]);
            if ok {
                ready.push(producer);
            }
        }
        ready.sort_unstable();
        for producer in ready {
            if !marked[producer.index()] {
                marked[producer.index()] = true;
                order.push(producer);
            }
        }
    }

    //
    // Levels.
    //

    /// The critical-path length: the maximum over all outputs of the
    /// longest fanin chain from any input. Cached until the next graph
    /// mutation.
    pub fn level(&mut self) -> u32 {
        if !self.level_valid {
            for &input in &self.inputs {
                self.levels[input] = 0;
            }
            let order = self.sort();
            for node in order {
                let l0 = self.levels[self.fanin(node, 0)];
                let l1 = self.levels[self.fanin(node, 1)];
                self.levels[node] = l0.max(l1) + 1;
            }
            let mut max = 0;
            for &output in &self.outputs {
                if let Some(driver) = self.output_fanin(output) {
                    max = max.max(self.levels[driver]);
                }
            }
            self.level = max;
            self.level_valid = true;
            log::trace!("level: {}", max);
        }
        self.level
    }

    /// The cached level of one node. Only meaningful after
    /// [`level`](Self::level) has run with the graph unchanged since.
    pub fn node_level(&self, node: Node) -> u32 {
        debug_assert!(self.level_valid, "node_level() without a level() pass");
        self.levels[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_folding() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);

        assert_eq!(g.new_and2(Handle::zero(), a), Handle::zero());
        assert_eq!(g.new_and2(a, Handle::one()), a);
        assert_eq!(g.new_and2(a, a), a);
        assert_eq!(g.new_and2(a, !a), Handle::zero());
        assert_eq!(g.logic_num(), 0);

        let ab = g.new_and2(a, !b);
        assert!(!ab.inv());
        let n = ab.node().unwrap();
        assert!(g.is_and(n));
        assert!(!g.fanin_inv(n, 0));
        assert!(g.fanin_inv(n, 1));
        assert_eq!(g.fanin(n, 0), a.node().unwrap());
        assert_eq!(g.fanin(n, 1), b.node().unwrap());
    }

    #[test]
    fn or_is_complemented_and() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);

        assert_eq!(g.new_or2(Handle::zero(), a), a);
        assert_eq!(g.new_or2(a, Handle::one()), Handle::one());
        assert_eq!(g.new_or2(a, !a), Handle::one());

        let ab = g.new_or2(a, b);
        assert!(ab.inv());
        let n = ab.node().unwrap();
        assert!(g.is_and(n));
        assert!(g.fanin_inv(n, 0));
        assert!(g.fanin_inv(n, 1));
    }

    #[test]
    fn xor_polarity_on_handle() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);

        assert_eq!(g.new_xor2(Handle::zero(), a), a);
        assert_eq!(g.new_xor2(a, Handle::one()), !a);
        assert_eq!(g.new_xor2(a, a), Handle::zero());
        assert_eq!(g.new_xor2(a, !a), Handle::one());

        let x = g.new_xor2(a, b);
        assert!(!x.inv());
        // XNOR reuses the same structure with the handle complemented.
        let xn = g.new_xor2(!a, b);
        assert!(xn.inv());
        let n = x.node().unwrap();
        assert!(g.is_xor(n));
        assert!(!g.fanin_inv(n, 0));
        assert!(!g.fanin_inv(n, 1));
    }

    #[test]
    fn wide_and_balances() {
        let mut g = SubjectGraph::new();
        let hs: Vec<Handle> = (0..5)
            .map(|_| Handle::new(g.new_input(), false))
            .collect();
        let root = g.new_and(&hs);
        assert_eq!(g.logic_num(), 4);
        assert_eq!(g.new_output(root), g.output(0));
        assert_eq!(g.level(), 3);
    }

    #[test]
    fn wide_and_constants() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        assert_eq!(g.new_and(&[]), Handle::one());
        assert_eq!(g.new_and(&[a, Handle::one()]), a);
        assert_eq!(g.new_and(&[a, Handle::zero(), a]), Handle::zero());
        assert_eq!(g.new_or(&[]), Handle::zero());
        assert_eq!(g.new_xor(&[]), Handle::zero());
        assert_eq!(g.new_xor(&[Handle::one(), Handle::one()]), Handle::zero());
        let odd = [Handle::one(), Handle::one(), Handle::one()];
        assert_eq!(g.new_xor(&odd), Handle::one());
    }

    #[test]
    fn sort_is_topological_and_deterministic() {
        let mut g = SubjectGraph::new();
        let i0 = Handle::new(g.new_input(), false);
        let i1 = Handle::new(g.new_input(), false);
        let i2 = Handle::new(g.new_input(), false);
        let i3 = Handle::new(g.new_input(), false);
        let x = g.new_and2(i0, i1);
        let y = g.new_and2(i2, i3);
        let z = g.new_and2(x, y);
        g.new_output(z);

        let order = g.sort();
        assert_eq!(order.len(), 3);
        let pos = |n: Node| order.iter().position(|&o| o == n).unwrap();
        assert!(pos(x.node().unwrap()) < pos(z.node().unwrap()));
        assert!(pos(y.node().unwrap()) < pos(z.node().unwrap()));
        assert_eq!(order, g.sort());

        let rorder = g.rsort();
        assert_eq!(rorder.len(), 3);
        let rpos = |n: Node| rorder.iter().position(|&o| o == n).unwrap();
        assert!(rpos(z.node().unwrap()) < rpos(x.node().unwrap()));
        assert!(rpos(z.node().unwrap()) < rpos(y.node().unwrap()));
    }

    #[test]
    fn level_per_node() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let c = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        let abc = g.new_and2(ab, c);
        g.new_output(abc);

        assert_eq!(g.level(), 2);
        assert_eq!(g.node_level(ab.node().unwrap()), 1);
        assert_eq!(g.node_level(abc.node().unwrap()), 2);
        for &i in &[a, b, c] {
            assert_eq!(g.node_level(i.node().unwrap()), 0);
        }
    }

    #[test]
    fn change_output_invalidates_level() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        let out = g.new_output(ab);
        assert_eq!(g.level(), 1);

        g.change_output(out, a);
        assert_eq!(g.level(), 0);
        assert_eq!(g.output_fanin(out), a.node());
        assert!(!g.output_fanin_inv(out));

        g.change_output(out, !ab);
        assert_eq!(g.level(), 1);
        assert!(g.output_fanin_inv(out));
    }

    #[test]
    fn delete_recycles_ids() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        let n = ab.node().unwrap();
        assert_eq!(g.logic_num(), 1);

        g.delete_logic(n);
        assert_eq!(g.logic_num(), 0);
        assert_eq!(g.fanout_num(a.node().unwrap()), 0);

        // The freed id comes back.
        let ab2 = g.new_and2(a, b);
        assert_eq!(ab2.node().unwrap(), n);
    }

    #[test]
    #[should_panic]
    fn delete_with_fanout_panics() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        g.new_output(ab);
        g.delete_logic(ab.node().unwrap());
    }

    #[test]
    fn constant_output() {
        let mut g = SubjectGraph::new();
        let out = g.new_output(Handle::one());
        assert_eq!(g.output_fanin(out), None);
        assert!(g.output_fanin_inv(out));
        assert_eq!(g.level(), 0);
    }

    #[test]
    fn ports_bind_once() {
        let mut g = SubjectGraph::new();
        let i0 = g.new_input();
        let i1 = g.new_input();
        let o = g.new_output(Handle::new(i0, false));

        let p = g.add_port("data", vec![i0, i1]).unwrap();
        assert_eq!(g.port(p).name(), "data");
        assert_eq!(g.port(p).bit_width(), 2);
        assert_eq!(g.port_of(i1), Some((p, 1)));
        assert_eq!(g.port_of(o), None);

        assert_eq!(
            g.add_port("again", vec![i0]),
            Err(GraphError::PortRebind { node: i0 })
        );
        let q = g.add_port("q", vec![o]).unwrap();
        assert_eq!(g.port_of(o), Some((q, 0)));
    }

    #[test]
    fn po_reach_mark() {
        let mut g = SubjectGraph::new();
        let a = Handle::new(g.new_input(), false);
        let b = Handle::new(g.new_input(), false);
        let ab = g.new_and2(a, b);
        assert!(!g.is_po_reachable(ab.node().unwrap()));
        g.new_output(ab);
        assert!(g.is_po_reachable(ab.node().unwrap()));
        assert!(!g.is_po_reachable(a.node().unwrap()));
    }

    #[test]
    fn dff_aggregate() {
        let mut g = SubjectGraph::new();
        let d = g.new_output(Handle::zero());
        let q = g.new_input();
        let ck = g.new_output(Handle::zero());
        let dff = g.new_dff(d, q, ck, None, None);
        assert_eq!(g.dff_num(), 1);
        assert_eq!(g.dff(dff).data_input(), d);
        assert_eq!(g.dff(dff).data_output(), q);
        assert_eq!(g.dff(dff).clock(), ck);
        assert_eq!(g.dff(dff).clear(), None);
        // Flip-flops do not take part in the combinational sort.
        assert!(g.sort().is_empty());
    }

    #[test]
    fn expr_lowering() {
        let mut g = SubjectGraph::new();
        let mut m = ExprMgr::new();
        let leaves: Vec<Handle> = (0..3)
            .map(|_| Handle::new(g.new_input(), false))
            .collect();

        // (v0 & !v1) ^ v2
        let v0 = m.posliteral(sylva_expr::VarId::from_u32(0));
        let nv1 = m.negaliteral(sylva_expr::VarId::from_u32(1));
        let v2 = m.posliteral(sylva_expr::VarId::from_u32(2));
        let and = m.and2(&v0, &nv1);
        let e = m.xor2(&and, &v2);

        let root = g.new_logic(&m, &e, &leaves);
        let n = root.node().unwrap();
        assert!(g.is_xor(n));
        assert_eq!(g.logic_num(), 2);
        let and_node = g.fanin(n, 0);
        assert!(g.is_and(and_node));
        assert!(!g.fanin_inv(and_node, 0));
        assert!(g.fanin_inv(and_node, 1));

        // Constants fold through the lowering.
        let zero = m.zero();
        assert_eq!(g.new_logic(&m, &zero, &leaves), Handle::zero());
    }
}
