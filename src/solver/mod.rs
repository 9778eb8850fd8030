//! MNA (Modified Nodal Analysis) solver and simulation loop.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Nodal Analysis
//!
//! Each tick assembles a dense system G·v = b where:
//! - v contains the voltage of every node except ground
//! - G is the conductance matrix
//! - b is the vector of currents injected into each node
//!
//! Voltage sources are folded into G as a stiff conductance (a penalty
//! formulation), so the system never grows branch-current unknowns.
//! Capacitors and inductors use backward-Euler companion models. Diodes,
//! LEDs, BJTs and switches are stamped as piecewise-linear elements chosen
//! from their state at the end of the previous tick.
//!
//! A small value is added to every diagonal entry so that floating
//! sub-circuits still produce a solvable system.

mod history;
mod mna;
mod simulator;
mod solve;
mod stamp;


pub use history::{history_key, History, Sample};
pub use mna::MnaMatrix;
pub use simulator::{RunState, Simulator, TickStats};
pub use solve::{solve_circuit, solve_circuit_nonlinear, SolveOutcome, SolveStatus};
pub use stamp::{stamp_component, OperatingPoint, StampContext};

/// Default tick length in seconds.
pub const DEFAULT_TIME_STEP: f64 = 1e-3;

/// Default number of samples kept per history series.
pub const DEFAULT_HISTORY_LENGTH: usize = 1000;

/// Per-node current imbalance tolerated by the conservation check (amps).
pub const CONSERVATION_TOLERANCE: f64 = 1e-6;

/// Diagonal regularizer keeping floating nodes solvable.
pub const REGULARIZATION: f64 = 1e-13;

/// Penalty conductance used to pin voltage source terminals.
pub const SOURCE_CONDUCTANCE: f64 = 1e9;

/// Smallest pivot magnitude accepted by the LU factorization.
pub const PIVOT_EPSILON: f64 = 1e-18;
