//! Per-tick linear solve and the nonlinear linearization policy.

use serde::Serialize;

use crate::circuit::{Circuit, Topology};
use crate::components::TickContext;
use crate::config::SimulationConfig;
use crate::error::Result;

use super::mna::MnaMatrix;
use super::stamp::{stamp_component, OperatingPoint, StampContext};

/// Result of the solve phase of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Node voltages were updated
    Solved,
    /// Nothing to solve (no components or no non-ground nodes)
    #[default]
    Skipped,
    /// The system could not be solved; previous voltages were kept
    Failed,
}

/// Outcome of [`solve_circuit`] / [`solve_circuit_nonlinear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SolveOutcome {
    /// Linear solves performed
    pub iterations: usize,
    pub status: SolveStatus,
}

impl SolveOutcome {
    fn skipped() -> Self {
        Self {
            iterations: 0,
            status: SolveStatus::Skipped,
        }
    }
}

fn is_degenerate(circuit: &Circuit, topology: &Topology) -> bool {
    circuit.is_empty() || topology.unknowns() == 0
}

/// Assemble and solve the system once for the given operating points.
fn solve_once(
    circuit: &Circuit,
    topology: &Topology,
    ops: &[OperatingPoint],
    config: &SimulationConfig,
    time: f64,
    dt: f64,
) -> Result<Vec<f64>> {
    let ctx = StampContext {
        topology,
        time,
        dt,
        source_conductance: config.source_conductance,
    };

    let mut matrix = MnaMatrix::new(topology.unknowns());
    for (component, op) in circuit.components().zip(ops) {
        stamp_component(&mut matrix, component, *op, &ctx);
    }
    matrix.regularize(config.regularization);
    matrix.factor()?;
    matrix.solve()?;
    Ok(matrix.x)
}

/// Solve the circuit once, stamping nonlinear devices from their state at
/// the end of the previous tick, and write the node voltages to `topology`.
///
/// On a numerical failure the error is logged and the previous voltages are
/// kept; nothing is returned to the caller.
pub fn solve_circuit(
    circuit: &Circuit,
    topology: &mut Topology,
    config: &SimulationConfig,
    time: f64,
    dt: f64,
) -> SolveOutcome {
    if is_degenerate(circuit, topology) {
        log::trace!("Nothing to solve ({} components, {} unknowns)", circuit.len(), topology.unknowns());
        return SolveOutcome::skipped();
    }

    let ops: Vec<OperatingPoint> = circuit
        .components()
        .map(|c| OperatingPoint::previous(&c.device))
        .collect();

    match solve_once(circuit, topology, &ops, config, time, dt) {
        Ok(solution) => {
            topology.set_voltages(&solution);
            SolveOutcome {
                iterations: 1,
                status: SolveStatus::Solved,
            }
        }
        Err(e) => {
            log::error!("Solve failed at t={:.6}s: {}; keeping previous node voltages", time, e);
            SolveOutcome {
                iterations: 1,
                status: SolveStatus::Failed,
            }
        }
    }
}

/// Solve with nonlinear devices.
///
/// With `max_linearization_passes == 1` this is exactly [`solve_circuit`].
/// With more passes, junctions and transistors are reclassified against each
/// solution and the system re-solved until no classification changes or the
/// pass limit is reached. This is a fixed-point iteration over discrete
/// states, not Newton-Raphson.
pub fn solve_circuit_nonlinear(
    circuit: &Circuit,
    topology: &mut Topology,
    config: &SimulationConfig,
    time: f64,
    dt: f64,
) -> SolveOutcome {
    if config.max_linearization_passes <= 1 {
        return solve_circuit(circuit, topology, config, time, dt);
    }
    if is_degenerate(circuit, topology) {
        return SolveOutcome::skipped();
    }

    let stale = topology.solution();
    let mut ops: Vec<OperatingPoint> = circuit
        .components()
        .map(|c| OperatingPoint::previous(&c.device))
        .collect();

    for pass in 1..=config.max_linearization_passes {
        let solution = match solve_once(circuit, topology, &ops, config, time, dt) {
            Ok(solution) => solution,
            Err(e) => {
                log::error!(
                    "Solve failed at t={:.6}s on pass {}: {}; keeping previous node voltages",
                    time,
                    pass,
                    e
                );
                topology.set_voltages(&stale);
                return SolveOutcome {
                    iterations: pass,
                    status: SolveStatus::Failed,
                };
            }
        };
        topology.set_voltages(&solution);

        let next: Vec<OperatingPoint> = circuit
            .components()
            .zip(&ops)
            .map(|(component, op)| {
                let voltages = topology.component_voltages(component);
                let ctx = TickContext {
                    time,
                    dt,
                    voltages: &voltages,
                    external_current: 0.0,
                };
                op.reclassify(component, &ctx)
            })
            .collect();

        let settled = next.iter().zip(&ops).all(|(a, b)| a.same_class(b));
        if settled {
            return SolveOutcome {
                iterations: pass,
                status: SolveStatus::Solved,
            };
        }
        ops = next;
    }

    log::debug!(
        "Operating points still changing after {} passes at t={:.6}s",
        config.max_linearization_passes,
        time
    );
    SolveOutcome {
        iterations: config.max_linearization_passes,
        status: SolveStatus::Solved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Terminal, TerminalRef};
    use crate::components::{DcVoltageSource, Device, Diode, Ground, Resistor};
    use approx::assert_relative_eq;

    fn diode_circuit() -> (Circuit, TerminalRef) {
        let mut c = Circuit::new();
        let v = c.add(Device::DcVoltageSource(DcVoltageSource::new(5.0)));
        let r = c.add(Device::Resistor(Resistor::new(1000.0)));
        let d = c.add(Device::Diode(Diode::default()));
        let g = c.add(Device::Ground(Ground::new()));
        let t = TerminalRef::new;
        c.connect(t(v, Terminal::Pos), t(r, Terminal::P1)).unwrap();
        c.connect(t(r, Terminal::P2), t(d, Terminal::Anode)).unwrap();
        c.connect(t(d, Terminal::Cathode), t(g, Terminal::Gnd)).unwrap();
        c.connect(t(v, Terminal::Neg), t(g, Terminal::Gnd)).unwrap();
        (c, t(d, Terminal::Anode))
    }

    #[test]
    fn test_empty_circuit_is_skipped() {
        let c = Circuit::new();
        let mut topo = Topology::build(&c);
        let out = solve_circuit(&c, &mut topo, &SimulationConfig::default(), 0.0, 1e-3);
        assert_eq!(out, SolveOutcome::skipped());
    }

    #[test]
    fn test_ground_only_circuit_is_skipped() {
        let mut c = Circuit::new();
        c.add(Device::Ground(Ground::new()));
        let mut topo = Topology::build(&c);
        let out = solve_circuit(&c, &mut topo, &SimulationConfig::default(), 0.0, 1e-3);
        assert_eq!(out.iterations, 0);
        assert_eq!(out.status, SolveStatus::Skipped);
    }

    #[test]
    fn test_single_pass_uses_previous_state() {
        let (c, anode) = diode_circuit();
        let mut topo = Topology::build(&c);
        let out = solve_circuit_nonlinear(&c, &mut topo, &SimulationConfig::default(), 1e-3, 1e-3);
        assert_eq!(out.iterations, 1);
        // Diode starts blocking, so the anode sits near the supply
        assert!(topo.terminal_voltage(anode) > 4.99);
    }

    #[test]
    fn test_fixed_point_settles_diode() {
        let (c, anode) = diode_circuit();
        let mut topo = Topology::build(&c);
        let config = SimulationConfig::default().with_max_linearization_passes(5);
        let out = solve_circuit_nonlinear(&c, &mut topo, &config, 1e-3, 1e-3);
        assert_eq!(out.status, SolveStatus::Solved);
        assert_eq!(out.iterations, 2);
        assert_relative_eq!(topo.terminal_voltage(anode), 7005.0 / 10001.0, epsilon = 1e-6);
    }

    #[test]
    fn test_failure_keeps_previous_voltages() {
        // A resistor floating on its own with no regularization is singular
        let mut c = Circuit::new();
        let r1 = c.add(Device::Resistor(Resistor::new(100.0)));
        let r2 = c.add(Device::Resistor(Resistor::new(100.0)));
        c.add(Device::Resistor(Resistor::new(100.0)));
        let t = TerminalRef::new;
        c.connect(t(r1, Terminal::P2), t(r2, Terminal::P1)).unwrap();
        let mut topo = Topology::build(&c);
        topo.set_voltages(&vec![1.0; topo.unknowns()]);

        let config = SimulationConfig::default().with_regularization(0.0);
        let out = solve_circuit(&c, &mut topo, &config, 1e-3, 1e-3);
        assert_eq!(out.status, SolveStatus::Failed);
        assert!(topo.solution().iter().all(|v| *v == 1.0));
    }
}
