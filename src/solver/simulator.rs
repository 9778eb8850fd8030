//! Main simulator interface.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::circuit::{Circuit, ComponentId, NodeId, Terminal, TerminalRef, Topology};
use crate::components::{Component, Device, TickContext};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::events::{EventBus, SimulationEvent, Subscriber, SubscriptionId};

use super::history::{History, Sample};
use super::solve::{solve_circuit_nonlinear, SolveStatus};

/// Lifecycle state of a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Statistics of the most recent tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickStats {
    /// Linear solves performed
    pub iterations: usize,
    pub status: SolveStatus,
    pub solve_time: Duration,
    /// Time spent in calculate/apply and history recording
    pub update_time: Duration,
    pub conservation_time: Duration,
    pub total_time: Duration,
    /// Ticks completed since the last start from stopped or reset
    pub tick_count: u64,
    /// Moving average of ticks per wall-clock second, from the interval
    /// between consecutive tick starts
    pub tick_rate: f64,
    /// Simulation time after the tick (seconds)
    pub simulation_time: f64,
    /// Nodes whose current sum exceeded the tolerance
    pub conservation_violations: usize,
}

/// Smoothing factor of the tick rate moving average.
const TICK_RATE_ALPHA: f64 = 0.1;

/// The circuit simulator: owns the circuit, its topology, simulation time
/// and history, and drives the per-tick pipeline.
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    /// Node structure for the current circuit revision
    topology: Topology,
    config: SimulationConfig,
    run_state: RunState,
    /// Simulation time in seconds
    time: f64,
    tick_count: u64,
    tick_rate: f64,
    /// Wall-clock start of the previous tick, for the tick rate
    last_tick_at: Option<Instant>,
    stats: TickStats,
    history: History,
    events: EventBus,
}

impl Simulator {
    /// Create a simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit) -> Self {
        let config = SimulationConfig::default();
        let topology = Topology::build(&circuit);
        Self {
            circuit,
            topology,
            history: History::new(config.history_length),
            config,
            run_state: RunState::Stopped,
            time: 0.0,
            tick_count: 0,
            tick_rate: 0.0,
            last_tick_at: None,
            stats: TickStats::default(),
            events: EventBus::new(),
        }
    }

    /// Create a simulator with a custom configuration.
    pub fn with_config(circuit: Circuit, config: SimulationConfig) -> Result<Self> {
        let mut sim = Self::new(circuit);
        sim.set_config(config)?;
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration. Shrinking the history length trims
    /// existing series.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;
        self.history.set_capacity(config.history_length);
        self.config = config;
        Ok(())
    }

    // ============ Queries ============

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn component(&self, id: ComponentId) -> Result<&Component> {
        self.circuit.component(id)
    }

    /// Mutable access for property edits. Structural edits go through
    /// [`connect`](Simulator::connect) and friends.
    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.circuit.component_mut(id)
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Statistics of the last completed tick.
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Recorded samples of `key` (optionally `key.sub_key`) for a component.
    pub fn history(&self, id: ComponentId, key: &str, sub_key: Option<&str>) -> Option<&VecDeque<Sample>> {
        self.history.get(id, key, sub_key)
    }

    pub fn history_store(&self) -> &History {
        &self.history
    }

    /// Signed sum of stored terminal currents into every node.
    pub fn node_current_sums(&self) -> Vec<(NodeId, f64)> {
        self.topology
            .nodes()
            .iter()
            .map(|node| {
                let sum: f64 = node
                    .members
                    .iter()
                    .filter_map(|m| {
                        self.circuit
                            .get(m.component)
                            .map(|c| c.terminal_current(m.terminal))
                    })
                    .sum();
                (node.id, sum)
            })
            .collect()
    }

    // ============ Structural Edits ============

    /// Add a device with a fresh id.
    pub fn add_component(&mut self, device: Device) -> ComponentId {
        let id = self.circuit.add(device);
        let kind = self.circuit.component(id).map(|c| c.kind());
        if let Ok(kind) = kind {
            self.events.publish(&SimulationEvent::ComponentAdded { id, kind });
        }
        self.rebuild_topology();
        id
    }

    /// Add a pre-built component, keeping its id.
    pub fn add(&mut self, component: Component) -> Result<ComponentId> {
        let kind = component.kind();
        let id = self.circuit.add_component(component)?;
        self.events.publish(&SimulationEvent::ComponentAdded { id, kind });
        self.rebuild_topology();
        Ok(id)
    }

    /// Remove a component, its connections and its history.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        let removed = self.circuit.remove(id)?;
        self.history.remove_component(id);
        self.events.publish(&SimulationEvent::ComponentRemoved { id });
        self.rebuild_topology();
        Ok(removed)
    }

    pub fn connect(&mut self, a: TerminalRef, b: TerminalRef) -> Result<()> {
        self.circuit.connect(a, b)?;
        self.events.publish(&SimulationEvent::Connected { a, b });
        self.rebuild_topology();
        Ok(())
    }

    pub fn disconnect(&mut self, a: TerminalRef, b: TerminalRef) -> Result<()> {
        self.circuit.disconnect(a, b)?;
        self.events.publish(&SimulationEvent::Disconnected { a, b });
        self.rebuild_topology();
        Ok(())
    }

    /// Re-resolve the nodes of the circuit. Node voltages start from zero.
    pub fn rebuild_topology(&mut self) {
        self.topology = Topology::build(&self.circuit);
        self.events.publish(&SimulationEvent::TopologyRebuilt {
            nodes: self.topology.node_count(),
            components: self.circuit.len(),
            ground: self.topology.ground(),
        });
    }

    // ============ Lifecycle ============

    /// Start from stopped (time restarts at 0 and the history is cleared)
    /// or resume from paused.
    pub fn start(&mut self) {
        match self.run_state {
            RunState::Running => {}
            RunState::Paused => self.resume(),
            RunState::Stopped => {
                self.time = 0.0;
                self.tick_count = 0;
                self.tick_rate = 0.0;
                self.last_tick_at = None;
                self.history.clear();
                self.run_state = RunState::Running;
                self.events.publish(&SimulationEvent::Started { time: self.time });
            }
        }
    }

    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
            self.events.publish(&SimulationEvent::Paused { time: self.time });
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            // The pause is not a tick interval
            self.last_tick_at = None;
            self.run_state = RunState::Running;
            self.events.publish(&SimulationEvent::Resumed { time: self.time });
        }
    }

    /// Stop without touching component state or history.
    pub fn stop(&mut self) {
        if self.run_state != RunState::Stopped {
            self.run_state = RunState::Stopped;
            self.events.publish(&SimulationEvent::Stopped { time: self.time });
        }
    }

    /// Stop and return every component, the history and the statistics to
    /// their initial values.
    pub fn reset(&mut self) {
        self.run_state = RunState::Stopped;
        self.time = 0.0;
        self.tick_count = 0;
        self.tick_rate = 0.0;
        self.last_tick_at = None;
        self.stats = TickStats::default();
        for component in self.circuit.components_mut() {
            component.reset_state();
        }
        self.history.clear();
        self.topology.clear_voltages();
        self.events.publish(&SimulationEvent::Reset);
    }

    pub fn subscribe<S: Subscriber + Send + 'static>(&mut self, subscriber: S) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ============ Ticking ============

    /// Advance the simulation by one step.
    ///
    /// `elapsed` overrides the configured time step when positive and finite.
    /// Returns the statistics of this tick, or of the last tick when not
    /// running or the circuit is empty.
    pub fn tick(&mut self, elapsed: Option<f64>) -> TickStats {
        if self.run_state != RunState::Running || self.circuit.is_empty() {
            return self.stats.clone();
        }

        let tick_start = Instant::now();
        let dt = match elapsed {
            Some(e) if e > 0.0 && e.is_finite() => e,
            _ => self.config.time_step,
        };
        if self.topology.is_stale(&self.circuit) {
            self.rebuild_topology();
        }
        // The instant being solved
        let t = self.time + dt;

        let solve_start = Instant::now();
        let outcome = solve_circuit_nonlinear(&self.circuit, &mut self.topology, &self.config, t, dt);
        let solve_time = solve_start.elapsed();
        if outcome.status == SolveStatus::Failed {
            self.events.publish(&SimulationEvent::SolveFailed {
                time: t,
                message: format!(
                    "nodal system with {} unknowns could not be solved; previous voltages kept",
                    self.topology.unknowns()
                ),
            });
        }

        let update_start = Instant::now();
        self.update_components(t, dt);
        self.record_history(t);
        let update_time = update_start.elapsed();

        let conservation_start = Instant::now();
        let violations = self.check_conservation(t);
        let conservation_time = conservation_start.elapsed();

        self.time = t;
        self.tick_count += 1;
        let total_time = tick_start.elapsed();
        self.update_tick_rate(tick_start);

        self.stats = TickStats {
            iterations: outcome.iterations,
            status: outcome.status,
            solve_time,
            update_time,
            conservation_time,
            total_time,
            tick_count: self.tick_count,
            tick_rate: self.tick_rate,
            simulation_time: self.time,
            conservation_violations: violations,
        };
        self.events.publish(&SimulationEvent::TickCompleted(self.stats.clone()));
        self.stats.clone()
    }

    /// Fold the interval since the previous tick start into the moving
    /// average.
    fn update_tick_rate(&mut self, tick_start: Instant) {
        if let Some(previous) = self.last_tick_at {
            let interval = tick_start.duration_since(previous).as_secs_f64();
            if interval > 0.0 {
                let rate = 1.0 / interval;
                self.tick_rate = if self.tick_rate == 0.0 {
                    rate
                } else {
                    (1.0 - TICK_RATE_ALPHA) * self.tick_rate + TICK_RATE_ALPHA * rate
                };
            }
        }
        self.last_tick_at = Some(tick_start);
    }

    /// Tick `ticks` times with the configured step.
    pub fn run_for(&mut self, ticks: usize) -> TickStats {
        for _ in 0..ticks {
            self.tick(None);
        }
        self.stats.clone()
    }

    /// Calculate and apply every component: first everything except voltage
    /// sources, then the sources, whose current comes from the rest of their
    /// positive node.
    fn update_components(&mut self, t: f64, dt: f64) {
        let mut sources = Vec::new();
        for component in self.circuit.components_mut() {
            if component.kind().is_voltage_source() {
                sources.push(component.id);
                continue;
            }
            let voltages = self.topology.component_voltages(component);
            let ctx = TickContext {
                time: t,
                dt,
                voltages: &voltages,
                external_current: 0.0,
            };
            let next = component.calculate(&ctx);
            component.apply(next);
        }

        for id in sources {
            let external_current = self.external_current(id);
            let Ok(component) = self.circuit.component_mut(id) else {
                continue;
            };
            let voltages = self.topology.component_voltages(component);
            let ctx = TickContext {
                time: t,
                dt,
                voltages: &voltages,
                external_current,
            };
            let next = component.calculate(&ctx);
            component.apply(next);
        }
    }

    /// Current into the other members of a source's positive node.
    fn external_current(&self, source: ComponentId) -> f64 {
        let Some(node) = self
            .topology
            .node_of(TerminalRef::new(source, Terminal::Pos))
            .and_then(|id| self.topology.node(id))
        else {
            return 0.0;
        };
        node.members
            .iter()
            .filter(|m| m.component != source)
            .filter_map(|m| {
                self.circuit
                    .get(m.component)
                    .map(|c| c.terminal_current(m.terminal))
            })
            .sum()
    }

    fn record_history(&mut self, t: f64) {
        for component in self.circuit.components() {
            let terminals: Vec<Terminal> = component.terminals().collect();
            self.history
                .record_state(component.id, &terminals, &component.state(), t);
        }
    }

    fn check_conservation(&self, t: f64) -> usize {
        let tolerance = self.config.conservation_tolerance;
        let mut violations = 0;
        for (node, sum) in self.node_current_sums() {
            if sum.abs() > tolerance {
                violations += 1;
                log::debug!(
                    "Current not conserved at node {} (t={:.6}s): net {:.3e} A",
                    node,
                    t,
                    sum
                );
            }
        }
        violations
    }

    /// Set the simulation time, e.g. when restoring a saved document.
    pub(crate) fn restore_time(&mut self, time: f64) {
        self.time = time;
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("components", &self.circuit.len())
            .field("nodes", &self.topology.node_count())
            .field("run_state", &self.run_state)
            .field("time", &self.time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DcVoltageSource, Ground, Resistor};
    use std::sync::{Arc, Mutex};

    fn divider() -> (Simulator, ComponentId) {
        let mut sim = Simulator::new(Circuit::new());
        let v = sim.add_component(Device::DcVoltageSource(DcVoltageSource::new(10.0)));
        let r1 = sim.add_component(Device::Resistor(Resistor::new(1000.0)));
        let r2 = sim.add_component(Device::Resistor(Resistor::new(1000.0)));
        let g = sim.add_component(Device::Ground(Ground::new()));
        let t = TerminalRef::new;
        sim.connect(t(v, Terminal::Pos), t(r1, Terminal::P1)).unwrap();
        sim.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        sim.connect(t(r2, Terminal::P2), t(g, Terminal::Gnd)).unwrap();
        sim.connect(t(v, Terminal::Neg), t(g, Terminal::Gnd)).unwrap();
        (sim, r2)
    }

    #[test]
    fn test_tick_is_noop_unless_running() {
        let (mut sim, _) = divider();
        let stats = sim.tick(None);
        assert_eq!(stats, TickStats::default());
        assert_eq!(sim.time(), 0.0);

        sim.start();
        sim.tick(None);
        sim.pause();
        let before = sim.time();
        sim.tick(None);
        assert_eq!(sim.time(), before);
    }

    #[test]
    fn test_state_machine_events() {
        let (mut sim, _) = divider();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sim.subscribe(move |e: &SimulationEvent| {
            if !matches!(e, SimulationEvent::TickCompleted(_)) {
                sink.lock().unwrap().push(e.name());
            }
        });

        sim.start();
        sim.start();
        sim.tick(None);
        sim.pause();
        sim.pause();
        sim.start();
        sim.stop();
        sim.stop();
        sim.reset();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["started", "paused", "resumed", "stopped", "reset"]
        );
        assert_eq!(sim.run_state(), RunState::Stopped);
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_elapsed_override() {
        let (mut sim, _) = divider();
        sim.start();
        sim.tick(Some(0.25));
        assert_eq!(sim.time(), 0.25);
        sim.tick(Some(-1.0));
        assert_eq!(sim.time(), 0.25 + sim.config().time_step);
        sim.tick(Some(f64::NAN));
        assert_eq!(sim.stats().tick_count, 3);
    }

    #[test]
    fn test_tick_records_history_and_stats() {
        let (mut sim, r2) = divider();
        sim.start();
        let stats = sim.run_for(3);
        assert_eq!(stats.tick_count, 3);
        assert_eq!(stats.status, SolveStatus::Solved);
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.conservation_violations, 0);

        let series = sim.history(r2, "voltages", Some("p1")).unwrap();
        assert_eq!(series.len(), 3);
        assert!((series[2].value - 5.0).abs() < 1e-6);
        assert!((series[0].time - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_structural_edit_rebuilds_topology() {
        let (mut sim, r2) = divider();
        let ground_members = |sim: &Simulator| {
            let topo = sim.topology();
            topo.node(topo.ground()).map(|n| n.members.len()).unwrap_or(0)
        };
        assert_eq!(ground_members(&sim), 3);
        let events = Arc::new(Mutex::new(0));
        let count = Arc::clone(&events);
        sim.subscribe(move |e: &SimulationEvent| {
            if let SimulationEvent::TopologyRebuilt { .. } = e {
                *count.lock().unwrap() += 1;
            }
        });

        sim.remove_component(r2).unwrap();
        assert!(!sim.topology().is_stale(sim.circuit()));
        assert_eq!(ground_members(&sim), 2);
        assert_eq!(*events.lock().unwrap(), 1);
        assert!(sim.remove_component(r2).is_err());
    }

    #[test]
    fn test_rejected_edit_publishes_nothing() {
        let (mut sim, r2) = divider();
        let events = Arc::new(Mutex::new(0));
        let count = Arc::clone(&events);
        sim.subscribe(move |_: &SimulationEvent| *count.lock().unwrap() += 1);

        let t = TerminalRef::new;
        assert!(sim.connect(t(r2, Terminal::P1), t(r2, Terminal::P1)).is_err());
        assert!(sim.connect(t(r2, Terminal::P1), t(r2, Terminal::Anode)).is_err());
        assert_eq!(*events.lock().unwrap(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = SimulationConfig::new().with_time_step(0.0);
        assert!(Simulator::with_config(Circuit::new(), bad).is_err());
    }

    #[test]
    fn test_tick_rate_follows_wall_clock_interval() {
        let (mut sim, _) = divider();
        sim.start();
        for _ in 0..8 {
            sim.tick(None);
            std::thread::sleep(Duration::from_millis(20));
        }
        // Ticks start at least 20 ms apart
        let rate = sim.stats().tick_rate;
        assert!(rate > 1.0 && rate <= 50.0, "tick rate {}", rate);

        sim.reset();
        assert_eq!(sim.stats().tick_rate, 0.0);
        sim.start();
        sim.tick(None);
        assert_eq!(sim.stats().tick_rate, 0.0);
    }

    #[test]
    fn test_restart_clears_history() {
        let (mut sim, r2) = divider();
        sim.start();
        sim.run_for(4);
        sim.stop();
        sim.start();
        assert!(sim.history(r2, "voltages", Some("p1")).is_none());

        sim.run_for(2);
        let series = sim.history(r2, "voltages", Some("p1")).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[1].time > series[0].time);
    }
}
