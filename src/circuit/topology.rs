//! Topology resolution: grouping connected terminals into electrical nodes.
//!
//! Every `(component, terminal)` pair is a key in a disjoint-set forest; each
//! recorded connection unions its two keys. Each resulting group is one node.
//! Keys are enumerated in component insertion order and then canonical
//! terminal order, and node ids are handed out in order of first appearance,
//! so resolving the same circuit twice yields the same numbering.

use std::collections::HashMap;
use std::fmt;

use crate::components::{Component, DeviceKind};

use super::{Circuit, NodeId, Terminal, TerminalRef};

/// Disjoint-set forest with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// An electrical node: a group of terminals at one potential.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Member terminals in key order
    pub members: Vec<TerminalRef>,
    /// Voltage from the most recent successful solve
    pub voltage: f64,
}

/// How the ground node was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundSource {
    /// Requested explicitly (e.g. by a loaded document)
    Preferred,
    /// Terminal of a ground component
    GroundComponent,
    /// Negative terminal of a voltage source
    VoltageSource,
    /// No reference in the circuit; the first node was used
    Arbitrary,
    /// The circuit had no terminals; an empty node was created
    Synthesized,
}

/// Resolved node structure of a circuit at one revision.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    ground: NodeId,
    ground_source: GroundSource,
    terminal_nodes: HashMap<TerminalRef, NodeId>,
    revision: u64,
}

impl Topology {
    /// Resolve the nodes of `circuit`.
    pub fn build(circuit: &Circuit) -> Self {
        let keys: Vec<TerminalRef> = circuit
            .components()
            .flat_map(|c| c.terminals().map(move |t| TerminalRef::new(c.id, t)))
            .collect();
        let index: HashMap<TerminalRef, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        let mut sets = UnionFind::new(keys.len());
        for component in circuit.components() {
            for (terminal, peers) in component.connections() {
                let Some(&a) = index.get(&TerminalRef::new(component.id, *terminal)) else {
                    log::warn!("Skipping undeclared terminal {}.{}", component.id, terminal);
                    continue;
                };
                for peer in peers {
                    match index.get(peer) {
                        Some(&b) => {
                            sets.union(a, b);
                        }
                        None => log::warn!(
                            "Skipping dangling connection {}.{} -> {}",
                            component.id,
                            terminal,
                            peer
                        ),
                    }
                }
            }
        }

        let mut nodes: Vec<Node> = Vec::new();
        let mut root_nodes: HashMap<usize, NodeId> = HashMap::new();
        let mut terminal_nodes = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let root = sets.find(i);
            let id = *root_nodes.entry(root).or_insert_with(|| {
                let id = NodeId(nodes.len());
                nodes.push(Node {
                    id,
                    members: Vec::new(),
                    voltage: 0.0,
                });
                id
            });
            nodes[id.0].members.push(*key);
            terminal_nodes.insert(*key, id);
        }

        let (ground, ground_source) = Self::select_ground(circuit, &mut nodes, &terminal_nodes);

        log::debug!(
            "Resolved {} nodes from {} terminals, ground {} ({:?})",
            nodes.len(),
            keys.len(),
            ground,
            ground_source
        );

        Self {
            nodes,
            ground,
            ground_source,
            terminal_nodes,
            revision: circuit.revision(),
        }
    }

    fn select_ground(
        circuit: &Circuit,
        nodes: &mut Vec<Node>,
        terminal_nodes: &HashMap<TerminalRef, NodeId>,
    ) -> (NodeId, GroundSource) {
        if let Some(preferred) = circuit.preferred_ground() {
            if preferred.0 < nodes.len() {
                return (preferred, GroundSource::Preferred);
            }
            log::warn!(
                "Requested ground {} does not exist ({} nodes); selecting automatically",
                preferred,
                nodes.len()
            );
        }

        let ground_component = circuit
            .components()
            .find(|c| c.kind() == DeviceKind::Ground)
            .and_then(|c| terminal_nodes.get(&TerminalRef::new(c.id, Terminal::Gnd)));
        if let Some(&node) = ground_component {
            return (node, GroundSource::GroundComponent);
        }

        let source_negative = circuit
            .components()
            .find(|c| c.kind().is_voltage_source())
            .and_then(|c| terminal_nodes.get(&TerminalRef::new(c.id, Terminal::Neg)));
        if let Some(&node) = source_negative {
            return (node, GroundSource::VoltageSource);
        }

        if !nodes.is_empty() {
            log::warn!("Circuit has no ground reference; using {}", nodes[0].id);
            return (nodes[0].id, GroundSource::Arbitrary);
        }

        let id = NodeId(0);
        nodes.push(Node {
            id,
            members: Vec::new(),
            voltage: 0.0,
        });
        (id, GroundSource::Synthesized)
    }

    /// All nodes, indexed by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ground(&self) -> NodeId {
        self.ground
    }

    pub fn ground_source(&self) -> GroundSource {
        self.ground_source
    }

    /// Circuit revision this topology was resolved from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the circuit changed structurally since this topology was built.
    pub fn is_stale(&self, circuit: &Circuit) -> bool {
        self.revision != circuit.revision()
    }

    /// Node a terminal belongs to.
    pub fn node_of(&self, terminal: TerminalRef) -> Option<NodeId> {
        self.terminal_nodes.get(&terminal).copied()
    }

    /// Number of unknowns in the linear system (every node except ground).
    pub fn unknowns(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Row/column of a node in the linear system; `None` for ground.
    pub fn matrix_index(&self, node: NodeId) -> Option<usize> {
        use std::cmp::Ordering;
        match node.0.cmp(&self.ground.0) {
            Ordering::Less => Some(node.0),
            Ordering::Equal => None,
            Ordering::Greater => Some(node.0 - 1),
        }
    }

    /// Matrix index of the node a terminal belongs to.
    pub fn terminal_index(&self, terminal: TerminalRef) -> Option<usize> {
        self.node_of(terminal).and_then(|n| self.matrix_index(n))
    }

    pub fn voltage(&self, node: NodeId) -> f64 {
        self.node(node).map(|n| n.voltage).unwrap_or(0.0)
    }

    /// Voltage at a terminal, 0 for terminals outside the topology.
    pub fn terminal_voltage(&self, terminal: TerminalRef) -> f64 {
        self.node_of(terminal).map(|n| self.voltage(n)).unwrap_or(0.0)
    }

    /// Voltages at each terminal of `component`, in canonical terminal order.
    pub fn component_voltages(&self, component: &Component) -> Vec<f64> {
        component
            .terminals()
            .map(|t| self.terminal_voltage(TerminalRef::new(component.id, t)))
            .collect()
    }

    /// Write a solution vector back to the nodes. Ground is pinned to 0.
    pub fn set_voltages(&mut self, solution: &[f64]) {
        for i in 0..self.nodes.len() {
            let id = self.nodes[i].id;
            self.nodes[i].voltage = self
                .matrix_index(id)
                .and_then(|k| solution.get(k).copied())
                .unwrap_or(0.0);
        }
    }

    /// Current node voltages in matrix order.
    pub fn solution(&self) -> Vec<f64> {
        self.nodes
            .iter()
            .filter(|n| n.id != self.ground)
            .map(|n| n.voltage)
            .collect()
    }

    /// Zero every node voltage.
    pub fn clear_voltages(&mut self) {
        for node in &mut self.nodes {
            node.voltage = 0.0;
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            let marker = if node.id == self.ground { " (ground)" } else { "" };
            write!(f, "{}{}: {:.6} V [", node.id, marker, node.voltage)?;
            for (i, m) in node.members.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", m)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentId;
    use crate::components::{DcVoltageSource, Device, Ground, Resistor};

    fn t(id: ComponentId, terminal: Terminal) -> TerminalRef {
        TerminalRef::new(id, terminal)
    }

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(!uf.union(1, 0));
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(3));
        assert!(uf.union(1, 4));
        assert_eq!(uf.find(0), uf.find(3));
        assert_ne!(uf.find(2), uf.find(0));
    }

    #[test]
    fn test_unconnected_terminals_are_separate_nodes() {
        let mut c = Circuit::new();
        let r = c.add(Device::Resistor(Resistor::default()));
        let topo = Topology::build(&c);
        assert_eq!(topo.node_count(), 2);
        assert_ne!(topo.node_of(t(r, Terminal::P1)), topo.node_of(t(r, Terminal::P2)));
        assert_eq!(topo.ground_source(), GroundSource::Arbitrary);
    }

    #[test]
    fn test_ground_component_wins() {
        let mut c = Circuit::new();
        let v = c.add(Device::DcVoltageSource(DcVoltageSource::new(5.0)));
        let r = c.add(Device::Resistor(Resistor::default()));
        let g = c.add(Device::Ground(Ground::new()));
        c.connect(t(v, Terminal::Pos), t(r, Terminal::P1)).unwrap();
        c.connect(t(r, Terminal::P2), t(g, Terminal::Gnd)).unwrap();

        let topo = Topology::build(&c);
        assert_eq!(topo.ground_source(), GroundSource::GroundComponent);
        assert_eq!(Some(topo.ground()), topo.node_of(t(r, Terminal::P2)));
        assert_eq!(topo.matrix_index(topo.ground()), None);
    }

    #[test]
    fn test_source_negative_is_fallback_ground() {
        let mut c = Circuit::new();
        let r = c.add(Device::Resistor(Resistor::default()));
        let v = c.add(Device::DcVoltageSource(DcVoltageSource::new(5.0)));
        c.connect(t(v, Terminal::Pos), t(r, Terminal::P1)).unwrap();
        c.connect(t(v, Terminal::Neg), t(r, Terminal::P2)).unwrap();

        let topo = Topology::build(&c);
        assert_eq!(topo.node_count(), 2);
        assert_eq!(topo.ground_source(), GroundSource::VoltageSource);
        assert_eq!(Some(topo.ground()), topo.node_of(t(v, Terminal::Neg)));
    }

    #[test]
    fn test_empty_circuit_synthesizes_ground() {
        let topo = Topology::build(&Circuit::new());
        assert_eq!(topo.node_count(), 1);
        assert_eq!(topo.unknowns(), 0);
        assert_eq!(topo.ground_source(), GroundSource::Synthesized);
        assert!(topo.nodes()[0].members.is_empty());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut c = Circuit::new();
        let v = c.add(Device::DcVoltageSource(DcVoltageSource::new(5.0)));
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(v, Terminal::Pos), t(r1, Terminal::P1)).unwrap();
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        c.connect(t(r2, Terminal::P2), t(v, Terminal::Neg)).unwrap();

        let a = Topology::build(&c);
        let b = Topology::build(&c);
        assert_eq!(a.nodes(), b.nodes());
        assert_eq!(a.ground(), b.ground());
        assert_eq!(a.node_count(), 3);
    }

    #[test]
    fn test_matrix_index_skips_ground() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        c.set_preferred_ground(Some(NodeId(1)));

        let mut topo = Topology::build(&c);
        assert_eq!(topo.ground(), NodeId(1));
        assert_eq!(topo.matrix_index(NodeId(0)), Some(0));
        assert_eq!(topo.matrix_index(NodeId(2)), Some(1));

        topo.set_voltages(&[3.0, 1.5]);
        assert_eq!(topo.voltage(NodeId(0)), 3.0);
        assert_eq!(topo.voltage(NodeId(1)), 0.0);
        assert_eq!(topo.terminal_voltage(t(r2, Terminal::P2)), 1.5);
        assert_eq!(topo.solution(), vec![3.0, 1.5]);
    }

    #[test]
    fn test_staleness_tracks_revision() {
        let mut c = Circuit::new();
        let r = c.add(Device::Resistor(Resistor::default()));
        let topo = Topology::build(&c);
        assert!(!topo.is_stale(&c));

        c.component_mut(r).unwrap().set_property("resistance", 10.0).unwrap();
        assert!(!topo.is_stale(&c));

        c.add(Device::Ground(Ground::new()));
        assert!(topo.is_stale(&c));
    }
}
