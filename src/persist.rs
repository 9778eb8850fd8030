//! Circuit documents: a serializable snapshot of a simulator.
//!
//! A document holds every component (with properties, connections and
//! live state), the simulation time, the time step and the ground node.
//! Loading validates connection references and symmetry before any
//! simulator is built.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, ComponentId, NodeId};
use crate::components::Component;
use crate::config::SimulationConfig;
use crate::error::{CircuitError, Result};
use crate::solver::Simulator;

/// Read a whole file as UTF-8.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CircuitError::FileReadError {
        path: path.display().to_string(),
        source,
    })
}

/// Write a whole file, replacing any previous content.
pub(crate) fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| CircuitError::FileWriteError {
        path: path.display().to_string(),
        source,
    })
}

/// Saved circuit and simulation clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDocument {
    pub components: IndexMap<ComponentId, Component>,
    #[serde(default)]
    pub simulation_time: f64,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default)]
    pub ground_node: Option<NodeId>,
}

fn default_time_step() -> f64 {
    crate::solver::DEFAULT_TIME_STEP
}

impl CircuitDocument {
    /// Snapshot a simulator.
    pub fn capture(sim: &Simulator) -> Self {
        Self {
            components: sim.circuit().component_map().clone(),
            simulation_time: sim.time(),
            time_step: sim.config().time_step,
            ground_node: Some(sim.topology().ground()),
        }
    }

    /// Build a stopped simulator from the document. The document's time
    /// step overrides the one in `config`.
    pub fn into_simulator(self, config: SimulationConfig) -> Result<Simulator> {
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(CircuitError::invalid_document(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if !self.simulation_time.is_finite() || self.simulation_time < 0.0 {
            return Err(CircuitError::invalid_document(format!(
                "simulation_time must be a non-negative number, got {}",
                self.simulation_time
            )));
        }

        let mut circuit = Circuit::from_components(self.components)?;
        circuit.set_preferred_ground(self.ground_node);
        let mut sim = Simulator::with_config(circuit, config.with_time_step(self.time_step))?;
        sim.restore_time(self.simulation_time);
        log::info!(
            "Loaded circuit with {} components, {} nodes",
            sim.circuit().len(),
            sim.topology().node_count()
        );
        Ok(sim)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&read_text(path.as_ref())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &self.to_json()?)
    }
}

impl Simulator {
    /// Snapshot this simulator as a document.
    pub fn document(&self) -> CircuitDocument {
        CircuitDocument::capture(self)
    }

    /// Build a simulator from a document.
    pub fn from_document(document: CircuitDocument, config: SimulationConfig) -> Result<Self> {
        document.into_simulator(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Terminal, TerminalRef};
    use crate::circuits;
    use crate::circuit::GroundSource;
    use crate::components::{DcVoltageSource, Device, Ground, PropertyValue, Resistor};
    use approx::assert_relative_eq;

    #[test]
    fn test_document_round_trip_after_ticks() {
        let mut sim = Simulator::new(circuits::rc_circuit().unwrap());
        sim.start();
        sim.run_for(5);

        let json = sim.document().to_json().unwrap();
        let loaded = Simulator::from_document(CircuitDocument::from_json(&json).unwrap(), SimulationConfig::default())
            .unwrap();

        for (original, restored) in sim.circuit().components().zip(loaded.circuit().components()) {
            assert_eq!(original.id, restored.id);
            assert_eq!(original.kind(), restored.kind());
            assert_eq!(original.connections(), restored.connections());
            for (a, b) in original.state().voltages().iter().zip(restored.state().voltages()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(loaded.time(), sim.time(), epsilon = 1e-15);
        assert_eq!(loaded.topology().ground(), sim.topology().ground());
        assert_eq!(loaded.topology().node_count(), sim.topology().node_count());
    }

    #[test]
    fn test_document_time_step_wins() {
        let mut doc = Simulator::new(circuits::voltage_divider().unwrap()).document();
        doc.time_step = 1e-4;
        let sim = doc.into_simulator(SimulationConfig::default()).unwrap();
        assert_eq!(sim.config().time_step, 1e-4);
    }

    #[test]
    fn test_asymmetric_connection_rejected() {
        let sim = Simulator::new(circuits::voltage_divider().unwrap());
        let mut json: serde_json::Value = serde_json::to_value(sim.document()).unwrap();
        // Drop one side of every connection of the first component
        let first = json["components"].as_object().unwrap().keys().next().unwrap().clone();
        json["components"][&first]["connections"] = serde_json::json!({});

        let doc: CircuitDocument = serde_json::from_value(json).unwrap();
        let err = doc.into_simulator(SimulationConfig::default()).unwrap_err();
        assert!(matches!(err, CircuitError::InvalidDocument { .. }));
    }

    #[test]
    fn test_bad_time_step_rejected() {
        let mut doc = Simulator::new(circuits::voltage_divider().unwrap()).document();
        doc.time_step = 0.0;
        assert!(doc.into_simulator(SimulationConfig::default()).is_err());
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = CircuitDocument::from_json("{\"components\": 3}").unwrap_err();
        assert!(matches!(err, CircuitError::Serialization(_)));
    }

    #[test]
    fn test_file_round_trip_keeps_properties() {
        let mut sim = Simulator::new(circuits::switch_circuit().unwrap());
        let switch = sim
            .circuit()
            .components()
            .find(|c| c.property("state").is_some())
            .map(|c| c.id)
            .unwrap();
        sim.component_mut(switch).unwrap().set_property("state", true).unwrap();

        let path = std::env::temp_dir().join(format!("circuit_core_doc_{}.json", std::process::id()));
        sim.document().save(&path).unwrap();
        let doc = CircuitDocument::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let loaded = doc.into_simulator(SimulationConfig::default()).unwrap();
        let c = loaded.component(switch).unwrap();
        assert_eq!(c.property("state"), Some(PropertyValue::Flag(true)));
        assert!(!c.peers(Terminal::P1).is_empty());
        assert!(c.is_connected(Terminal::P1, c.peers(Terminal::P1)[0]));
        let peer: TerminalRef = c.peers(Terminal::P1)[0];
        assert!(loaded.component(peer.component).unwrap().is_connected(peer.terminal, TerminalRef::new(switch, Terminal::P1)));
    }

    #[test]
    fn test_loaded_ground_survives_renumbering_edit() {
        let mut c = Circuit::new();
        let spare = c.add(Device::Resistor(Resistor::new(470.0)));
        let v = c.add(Device::DcVoltageSource(DcVoltageSource::new(10.0)));
        let r1 = c.add(Device::Resistor(Resistor::new(1000.0)));
        let r2 = c.add(Device::Resistor(Resistor::new(1000.0)));
        let g = c.add(Device::Ground(Ground::new()));
        c.add(Device::Resistor(Resistor::new(470.0)));
        c.add(Device::Resistor(Resistor::new(470.0)));
        c.connect(TerminalRef::new(v, Terminal::Pos), TerminalRef::new(r1, Terminal::P1)).unwrap();
        c.connect(TerminalRef::new(r1, Terminal::P2), TerminalRef::new(r2, Terminal::P1)).unwrap();
        c.connect(TerminalRef::new(r2, Terminal::P2), TerminalRef::new(g, Terminal::Gnd)).unwrap();
        c.connect(TerminalRef::new(v, Terminal::Neg), TerminalRef::new(g, Terminal::Gnd)).unwrap();

        let json = Simulator::new(c).document().to_json().unwrap();
        let mut sim = Simulator::from_document(CircuitDocument::from_json(&json).unwrap(), SimulationConfig::default())
            .unwrap();
        assert_eq!(sim.topology().ground_source(), GroundSource::Preferred);

        // Shifts every later node id down by two
        sim.remove_component(spare).unwrap();
        sim.start();
        sim.tick(None);

        let topo = sim.topology();
        let gnd = TerminalRef::new(g, Terminal::Gnd);
        assert_eq!(topo.ground_source(), GroundSource::GroundComponent);
        assert_eq!(Some(topo.ground()), topo.node_of(gnd));
        assert_eq!(topo.terminal_voltage(gnd), 0.0);
        assert_relative_eq!(topo.terminal_voltage(TerminalRef::new(r2, Terminal::P1)), 5.0, epsilon = 1e-9);
    }
}
