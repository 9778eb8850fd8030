//! Circuit graph: the component store and its terminal connections.

use indexmap::IndexMap;

use crate::components::{Component, Device};
use crate::error::{CircuitError, Result};

use super::validate::validate_circuit;
use super::{ComponentId, NodeId, TerminalRef};

/// A circuit: components in insertion order plus symmetric terminal connections.
///
/// Every structural edit (add, remove, connect, disconnect) bumps
/// [`revision`](Circuit::revision); a [`Topology`](super::Topology) built from
/// an older revision is stale. Property edits through
/// [`component_mut`](Circuit::component_mut) do not change the revision.
///
/// Node ids are numbered by first appearance, so a structural edit also
/// drops any preferred ground: the id would name a different node.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    components: IndexMap<ComponentId, Component>,
    next_id: u64,
    revision: u64,
    /// Ground node requested by a loaded document
    preferred_ground: Option<NodeId>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a circuit from already-connected components, e.g. a loaded document.
    ///
    /// Connections are validated for dangling references and symmetry.
    pub fn from_components(components: IndexMap<ComponentId, Component>) -> Result<Self> {
        for (key, component) in &components {
            if *key != component.id {
                return Err(CircuitError::invalid_document(format!(
                    "component stored under {} has id {}",
                    key, component.id
                )));
            }
        }

        let next_id = components.keys().map(|id| id.0 + 1).max().unwrap_or(0);
        let circuit = Self {
            components,
            next_id,
            revision: 0,
            preferred_ground: None,
        };
        validate_circuit(&circuit)?;
        Ok(circuit)
    }

    /// Add a device with a fresh id.
    pub fn add(&mut self, device: Device) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        self.components.insert(id, Component::new(id, device));
        self.touch();
        log::debug!("Added component {} ({})", id, self.components[&id].kind());
        id
    }

    /// Add a pre-built component, keeping its id. Existing connections on the
    /// component are discarded; use [`connect`](Circuit::connect) afterwards.
    pub fn add_component(&mut self, mut component: Component) -> Result<ComponentId> {
        let id = component.id;
        if self.components.contains_key(&id) {
            return Err(CircuitError::DuplicateComponent { id });
        }
        let peers: Vec<_> = component
            .connections()
            .values()
            .flatten()
            .map(|p| p.component)
            .collect();
        for peer in peers {
            component.remove_connections_to(peer);
        }

        self.next_id = self.next_id.max(id.0 + 1);
        self.components.insert(id, component);
        self.touch();
        Ok(id)
    }

    /// Remove a component and sever every connection to it.
    pub fn remove(&mut self, id: ComponentId) -> Result<Component> {
        let removed = self
            .components
            .shift_remove(&id)
            .ok_or(CircuitError::UnknownComponent { id })?;

        for component in self.components.values_mut() {
            component.remove_connections_to(id);
        }
        self.touch();
        log::debug!("Removed component {} ({})", id, removed.kind());
        Ok(removed)
    }

    /// Connect two terminals. The connection is recorded on both components.
    ///
    /// Rejected, without changing anything, when either component or terminal
    /// is unknown, when both sides are the same terminal, or when the pair is
    /// already connected.
    pub fn connect(&mut self, a: TerminalRef, b: TerminalRef) -> Result<()> {
        self.check_pair(a, b)?;
        if self.component(a.component)?.is_connected(a.terminal, b) {
            return Err(CircuitError::DuplicateConnection {
                from_id: a.component,
                from_terminal: a.terminal,
                to_id: b.component,
                to_terminal: b.terminal,
            });
        }

        self.component_entry(a.component)?.add_connection(a.terminal, b);
        self.component_entry(b.component)?.add_connection(b.terminal, a);
        self.touch();
        log::debug!("Connected {} to {}", a, b);
        Ok(())
    }

    /// Remove a connection between two terminals.
    pub fn disconnect(&mut self, a: TerminalRef, b: TerminalRef) -> Result<()> {
        self.check_pair(a, b)?;
        if !self.component(a.component)?.is_connected(a.terminal, b) {
            return Err(CircuitError::ConnectionNotFound {
                from_id: a.component,
                from_terminal: a.terminal,
                to_id: b.component,
                to_terminal: b.terminal,
            });
        }

        self.component_entry(a.component)?.remove_connection(a.terminal, b);
        self.component_entry(b.component)?.remove_connection(b.terminal, a);
        self.touch();
        log::debug!("Disconnected {} from {}", a, b);
        Ok(())
    }

    fn check_pair(&self, a: TerminalRef, b: TerminalRef) -> Result<()> {
        self.component(a.component)?.check_terminal(a.terminal)?;
        self.component(b.component)?.check_terminal(b.terminal)?;
        if a == b {
            return Err(CircuitError::SelfConnection {
                id: a.component,
                terminal: a.terminal,
            });
        }
        Ok(())
    }

    fn component_entry(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.components
            .get_mut(&id)
            .ok_or(CircuitError::UnknownComponent { id })
    }

    fn touch(&mut self) {
        self.preferred_ground = None;
        self.revision += 1;
    }

    /// Look up a component.
    pub fn component(&self, id: ComponentId) -> Result<&Component> {
        self.components
            .get(&id)
            .ok_or(CircuitError::UnknownComponent { id })
    }

    /// Mutable access for property and placement edits.
    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.component_entry(id)
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Components in insertion order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub(crate) fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.values_mut()
    }

    /// The id-keyed component map.
    pub fn component_map(&self) -> &IndexMap<ComponentId, Component> {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Structural revision counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn preferred_ground(&self) -> Option<NodeId> {
        self.preferred_ground
    }

    /// Request a specific ground node on the next topology build. The
    /// request lasts until the next structural edit.
    pub fn set_preferred_ground(&mut self, node: Option<NodeId>) {
        if self.preferred_ground != node {
            self.preferred_ground = node;
            self.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Terminal;
    use crate::components::{Resistor, Switch};

    fn t(id: ComponentId, terminal: Terminal) -> TerminalRef {
        TerminalRef::new(id, terminal)
    }

    #[test]
    fn test_connect_is_symmetric() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();

        assert_eq!(c.component(r1).unwrap().peers(Terminal::P2), &[t(r2, Terminal::P1)]);
        assert_eq!(c.component(r2).unwrap().peers(Terminal::P1), &[t(r1, Terminal::P2)]);
    }

    #[test]
    fn test_structural_errors_leave_circuit_unchanged() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        let revision = c.revision();

        let err = c.connect(t(r1, Terminal::Anode), t(r2, Terminal::P2)).unwrap_err();
        assert!(matches!(err, CircuitError::UnknownTerminal { .. }));

        let err = c.connect(t(r1, Terminal::P1), t(r1, Terminal::P1)).unwrap_err();
        assert!(matches!(err, CircuitError::SelfConnection { .. }));

        let err = c.connect(t(r2, Terminal::P1), t(r1, Terminal::P2)).unwrap_err();
        assert!(matches!(err, CircuitError::DuplicateConnection { .. }));

        let err = c.connect(t(r1, Terminal::P1), t(ComponentId(99), Terminal::P1)).unwrap_err();
        assert!(matches!(err, CircuitError::UnknownComponent { .. }));
        assert!(err.is_structural());

        let err = c.disconnect(t(r1, Terminal::P1), t(r2, Terminal::P2)).unwrap_err();
        assert!(matches!(err, CircuitError::ConnectionNotFound { .. }));

        assert_eq!(c.revision(), revision);
        assert_eq!(c.component(r1).unwrap().connections().len(), 1);
        assert!(c.component(r1).unwrap().peers(Terminal::P1).is_empty());
    }

    #[test]
    fn test_connecting_own_terminals_is_allowed() {
        let mut c = Circuit::new();
        let sw = c.add(Device::Switch(Switch::new(false)));
        c.connect(t(sw, Terminal::P1), t(sw, Terminal::P2)).unwrap();
        assert!(c.component(sw).unwrap().is_connected(Terminal::P1, t(sw, Terminal::P2)));
    }

    #[test]
    fn test_remove_severs_peers() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();

        c.remove(r2).unwrap();
        assert!(c.component(r1).unwrap().connections().is_empty());
        assert!(matches!(c.remove(r2), Err(CircuitError::UnknownComponent { .. })));

        // Ids are never reused
        let r3 = c.add(Device::Resistor(Resistor::default()));
        assert_eq!(r3, ComponentId(2));
    }

    #[test]
    fn test_disconnect_bumps_revision() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        let r2 = c.add(Device::Resistor(Resistor::default()));
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        let before = c.revision();
        c.disconnect(t(r2, Terminal::P1), t(r1, Terminal::P2)).unwrap();
        assert!(c.revision() > before);
        assert!(c.component(r2).unwrap().connections().is_empty());
    }

    #[test]
    fn test_structural_edit_drops_preferred_ground() {
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::default()));
        c.set_preferred_ground(Some(NodeId(1)));
        assert_eq!(c.preferred_ground(), Some(NodeId(1)));

        // Property edits keep it
        c.component_mut(r1).unwrap().set_property("resistance", 220.0).unwrap();
        assert_eq!(c.preferred_ground(), Some(NodeId(1)));

        c.add(Device::Resistor(Resistor::default()));
        assert_eq!(c.preferred_ground(), None);
    }
}
