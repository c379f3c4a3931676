//! Netlist generation by back-tracing through a map record.

use crate::{CellLibrary, CellNetwork, MapError, MapRecord, NetId, PortDir, Sense};
use sylva_entity::{PackedOption, SecondaryMap};
use sylva_subject::{Dff, Node, PortData, SubjectGraph};

/// A deferred request to materialize the cone feeding an output-kind
/// subject node.
#[derive(Copy, Clone, Debug)]
struct MapReq {
    node: Node,
    inv: bool,
}

/// Builds a gate-level netlist from a subject graph and a [`MapRecord`].
///
/// Ports come first, then flip-flops, then every queued combinational
/// cone is resolved by recursive back-trace through the recorded cuts.
/// The `(node, polarity)` memo guarantees at most one cell instance per
/// representative, so cones shared between outputs are emitted once.
#[derive(Default)]
pub struct MapGen {
    /// `(node, polarity)` -> emitted netlist node.
    node_map: SecondaryMap<Node, [PackedOption<NetId>; 2]>,
    requests: Vec<MapReq>,
}

impl MapGen {
    /// Create a generator with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `graph` through `record` into `sink`.
    pub fn generate(
        &mut self,
        graph: &SubjectGraph,
        library: &CellLibrary,
        record: &MapRecord,
        sink: &mut impl CellNetwork,
    ) -> Result<(), MapError> {
        self.node_map.clear();
        self.requests.clear();
        sink.set_name(graph.name());

        if graph.latch_num() > 0 {
            return Err(MapError::LatchesUnsupported);
        }

        for (_, port) in graph.ports() {
            self.gen_port(graph, port, sink);
        }
        for (dff, _) in graph.dffs() {
            self.gen_dff(graph, dff, library, record, sink)?;
        }

        // The request list is complete; resolve every cone.
        for i in 0..self.requests.len() {
            let req = self.requests[i];
            let driver = graph.output_fanin(req.node);
            let inv = graph.output_fanin_inv(req.node) ^ req.inv;
            let mapnode = match driver {
                Some(node) => self.back_trace(record, sink, node, inv)?,
                None => {
                    // An output tied to a constant becomes a constant
                    // cell.
                    let cell = if inv {
                        record
                            .const1_cell()
                            .ok_or(MapError::MissingConstCell { value: true })?
                    } else {
                        record
                            .const0_cell()
                            .ok_or(MapError::MissingConstCell { value: false })?
                    };
                    sink.new_logic_cell("", cell)
                }
            };
            let sink_node = self.node_map[req.node][0].unwrap();
            sink.connect(mapnode, sink_node, 0);
        }
        log::debug!(
            "mapgen: {} ports, {} dffs, {} cone requests",
            graph.port_num(),
            graph.dff_num(),
            self.requests.len()
        );
        Ok(())
    }

    fn gen_port(&mut self, graph: &SubjectGraph, port: &PortData, sink: &mut impl CellNetwork) {
        let dirs: Vec<PortDir> = port
            .bits()
            .iter()
            .map(|&bit| {
                if graph.is_input(bit) {
                    PortDir::Input
                } else {
                    PortDir::Output
                }
            })
            .collect();
        let nets = sink.new_port(port.name(), &dirs);
        for (&bit, net) in port.bits().iter().zip(nets) {
            self.node_map[bit][0] = net.into();
            if graph.is_output(bit) {
                self.requests.push(MapReq {
                    node: bit,
                    inv: false,
                });
            }
        }
    }

    fn gen_dff(
        &mut self,
        graph: &SubjectGraph,
        dff: Dff,
        library: &CellLibrary,
        record: &MapRecord,
        sink: &mut impl CellNetwork,
    ) -> Result<(), MapError> {
        // Prefer the cell producing the plain output; fall back to the
        // complemented-output cell with every polarity flipped.
        let (cell, inv) = match record.dff_cell(dff, false) {
            Some(cell) => (cell, false),
            None => match record.dff_cell(dff, true) {
                Some(cell) => (cell, true),
                None => return Err(MapError::MissingDffCell { dff }),
            },
        };
        let data = graph.dff(dff);
        let ff = library
            .cell(cell)
            .ff
            .as_ref()
            .ok_or(MapError::MissingDffCell { dff })?;
        let pins = sink.new_dff("", cell, ff);

        self.node_map[data.data_output()][inv as usize] = pins.output.into();
        if let Some(xq) = pins.xoutput {
            self.node_map[data.data_output()][!inv as usize] = xq.into();
        }

        self.node_map[data.data_input()][0] = pins.input.into();
        self.requests.push(MapReq {
            node: data.data_input(),
            inv,
        });

        self.node_map[data.clock()][0] = pins.clock.into();
        self.requests.push(MapReq {
            node: data.clock(),
            inv: ff.clock == Sense::Negative,
        });

        if let Some(sense) = ff.clear {
            // The complemented cell swaps the roles of clear and preset.
            let source = if inv { data.preset() } else { data.clear() };
            if let (Some(source), Some(pin)) = (source, pins.clear) {
                self.node_map[source][0] = pin.into();
                self.requests.push(MapReq {
                    node: source,
                    inv: sense == Sense::Negative,
                });
            }
        }
        if let Some(sense) = ff.preset {
            let source = if inv { data.clear() } else { data.preset() };
            if let (Some(source), Some(pin)) = (source, pins.preset) {
                self.node_map[source][0] = pin.into();
                self.requests.push(MapReq {
                    node: source,
                    inv: sense == Sense::Negative,
                });
            }
        }
        Ok(())
    }

    /// Materialize the cone computing `node` under polarity `inv` and
    /// return its netlist node, reusing an earlier instance when one
    /// exists.
    fn back_trace(
        &mut self,
        record: &MapRecord,
        sink: &mut impl CellNetwork,
        node: Node,
        inv: bool,
    ) -> Result<NetId, MapError> {
        if let Some(mapped) = self.node_map[node][inv as usize].expand() {
            return Ok(mapped);
        }

        let (cell, cut) = record
            .node_match(node, inv)
            .ok_or(MapError::MissingMatch { node, inv })?;
        let mapnode = sink.new_logic_cell("", cell);
        self.node_map[node][inv as usize] = mapnode.into();

        let leaves: Vec<(Node, bool)> = cut.leaves().collect();
        for (pin, (leaf, leaf_inv)) in leaves.into_iter().enumerate() {
            let source = self.back_trace(record, sink, leaf, leaf_inv)?;
            sink.connect(source, mapnode, pin);
        }
        Ok(mapnode)
    }
}
