//! # Circuit Core
//!
//! A tick-driven analog circuit simulator.
//!
//! This library provides:
//! - Component models with named terminals, typed properties and typed state
//! - A union-find topology resolver that groups terminals into nodes
//! - Modified Nodal Analysis (MNA) stamping and a dense LU solve per tick
//! - A simulation loop with bounded history, current conservation checks
//!   and lifecycle events
//!
//! ## Architecture
//!
//! - [`circuit`] - Circuit graph, connections and topology
//! - [`components`] - Component models (resistors, sources, diodes, BJTs, ...)
//! - [`solver`] - MNA assembly, linear solve and the [`Simulator`]
//! - [`events`] - Simulation events and subscribers
//! - [`config`] - Simulation configuration
//! - [`persist`] - JSON circuit documents
//! - [`circuits`] - Built-in example circuits
//!
//! ## Usage
//!
//! ```no_run
//! use circuit_core::{circuits, events::LogSubscriber, Simulator};
//!
//! let mut sim = Simulator::new(circuits::voltage_divider()?);
//! sim.subscribe(LogSubscriber);
//! sim.start();
//! let stats = sim.run_for(10);
//! println!("{} ticks, t = {}s", stats.tick_count, sim.time());
//! # Ok::<(), circuit_core::CircuitError>(())
//! ```
//!
//! ## Circuit Simulation Method
//!
//! Each tick of length dt:
//!
//! 1. Stamp every component into a conductance matrix G and source vector b
//! 2. Solve G·v = b for the node voltages (ground pinned at 0V)
//! 3. Hand each component its terminal voltages and derive its new state
//! 4. Record history and check that current sums to zero at every node
//!
//! Capacitors and inductors use backward-Euler companion models. Diodes,
//! LEDs, BJTs and switches are piecewise linear, stamped from the state
//! they reached on the previous tick.

pub mod circuit;
pub mod circuits;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod persist;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use config::SimulationConfig;
pub use error::{CircuitError, Result};
pub use persist::CircuitDocument;
pub use solver::Simulator;
