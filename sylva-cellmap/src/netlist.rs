//! The emission seam: the sink trait mapped netlists are written into,
//! and a simple vector-backed implementation of it.

use crate::{CellId, FFInfo};
use sylva_entity::{entity_impl, PrimaryMap, SecondaryMap};

/// An opaque reference to a node of the emitted netlist.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(u32);
entity_impl!(NetId, "net");

/// Direction of one port bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortDir {
    /// Driven from outside.
    Input,
    /// Driven by the netlist.
    Output,
}

/// The pins of an emitted flip-flop, as netlist nodes.
#[derive(Clone, Debug)]
pub struct DffPins {
    /// Data input pin.
    pub input: NetId,
    /// Data output pin.
    pub output: NetId,
    /// Complemented data output, when the cell has one.
    pub xoutput: Option<NetId>,
    /// Clock pin.
    pub clock: NetId,
    /// Asynchronous clear, when the cell has one.
    pub clear: Option<NetId>,
    /// Asynchronous preset, when the cell has one.
    pub preset: Option<NetId>,
}

/// Where the map generator writes its result.
///
/// The generator drives this interface and nothing else, so a consumer
/// can emit straight into its own network representation. `new_port`
/// returns one netlist node per bit (the query surface for port bits) and
/// `new_dff` returns the created pin set.
pub trait CellNetwork {
    /// Name the network.
    fn set_name(&mut self, name: &str);

    /// Create a named port; one node per bit, in order. Input bits are
    /// sources, output bits are sinks with a single fanin at pin 0.
    fn new_port(&mut self, name: &str, dirs: &[PortDir]) -> Vec<NetId>;

    /// Instantiate a flip-flop cell. `ff` describes which optional pins
    /// the cell has.
    fn new_dff(&mut self, name: &str, cell: CellId, ff: &FFInfo) -> DffPins;

    /// Instantiate a logic cell; the returned node is its output.
    fn new_logic_cell(&mut self, name: &str, cell: CellId) -> NetId;

    /// Connect `src` to input pin `pin` of `dst`.
    fn connect(&mut self, src: NetId, dst: NetId, pin: usize);
}

/// What one [`Netlist`] node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetKind {
    /// A bit of a named port.
    PortBit {
        /// Port name.
        name: String,
        /// Bit position within the port.
        bit: usize,
        /// Bit direction.
        dir: PortDir,
    },
    /// The output of a logic cell instance.
    Cell {
        /// The instantiated cell.
        cell: CellId,
    },
    /// One pin of a flip-flop instance.
    DffPin {
        /// The instantiated cell.
        cell: CellId,
        /// Pin name: `"D"`, `"Q"`, `"XQ"`, `"CK"`, `"CLR"` or `"PRE"`.
        pin: &'static str,
    },
}

/// A minimal in-memory [`CellNetwork`]: keeps every created node and
/// connection for inspection. The crate's tests use it; it also serves
/// as the reference for implementing the trait over a real netlist
/// database.
#[derive(Debug, Default)]
pub struct Netlist {
    name: String,
    nodes: PrimaryMap<NetId, NetKind>,
    /// Fanins per node, as `(pin, source)` pairs in connection order.
    fanins: SecondaryMap<NetId, Vec<(usize, NetId)>>,
}

impl Netlist {
    /// Create an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// The network name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of nodes.
    pub fn node_num(&self) -> usize {
        self.nodes.len()
    }

    /// What `node` is.
    pub fn kind(&self, node: NetId) -> &NetKind {
        &self.nodes[node]
    }

    /// Iterate over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NetId, &NetKind)> {
        self.nodes.iter()
    }

    /// The source connected to input pin `pin` of `node`, if any.
    pub fn fanin(&self, node: NetId, pin: usize) -> Option<NetId> {
        self.fanins[node]
            .iter()
            .find(|&&(p, _)| p == pin)
            .map(|&(_, src)| src)
    }

    /// Number of connections into `node`.
    pub fn fanin_num(&self, node: NetId) -> usize {
        self.fanins[node].len()
    }

    /// Number of logic-cell instances of `cell`.
    pub fn instance_num(&self, cell: CellId) -> usize {
        self.nodes
            .values()
            .filter(|kind| matches!(kind, NetKind::Cell { cell: c } if *c == cell))
            .count()
    }

    /// Number of logic-cell instances of any cell.
    pub fn cell_num(&self) -> usize {
        self.nodes
            .values()
            .filter(|kind| matches!(kind, NetKind::Cell { .. }))
            .count()
    }

    /// The node of the `bit`-th bit of port `name`, if present.
    pub fn port_bit(&self, name: &str, bit: usize) -> Option<NetId> {
        self.nodes.iter().find_map(|(id, kind)| match kind {
            NetKind::PortBit {
                name: n, bit: b, ..
            } if n == name && *b == bit => Some(id),
            _ => None,
        })
    }
}

impl CellNetwork for Netlist {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn new_port(&mut self, name: &str, dirs: &[PortDir]) -> Vec<NetId> {
        dirs.iter()
            .enumerate()
            .map(|(bit, &dir)| {
                self.nodes.push(NetKind::PortBit {
                    name: name.to_string(),
                    bit,
                    dir,
                })
            })
            .collect()
    }

    fn new_dff(&mut self, _name: &str, cell: CellId, ff: &FFInfo) -> DffPins {
        let mut pin = |pin: &'static str| self.nodes.push(NetKind::DffPin { cell, pin });
        DffPins {
            input: pin("D"),
            output: pin("Q"),
            xoutput: ff.complemented_output.then(|| pin("XQ")),
            clock: pin("CK"),
            clear: ff.clear.map(|_| pin("CLR")),
            preset: ff.preset.map(|_| pin("PRE")),
        }
    }

    fn new_logic_cell(&mut self, _name: &str, cell: CellId) -> NetId {
        self.nodes.push(NetKind::Cell { cell })
    }

    fn connect(&mut self, src: NetId, dst: NetId, pin: usize) {
        debug_assert!(
            self.fanin(dst, pin).is_none(),
            "pin {} of {} connected twice",
            pin,
            dst
        );
        self.fanins[dst].push((pin, src));
    }
}
