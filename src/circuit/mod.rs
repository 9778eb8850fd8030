//! Circuit graph representation, topology resolution and validation.
//!
//! The [`Circuit`] struct holds all components and their terminal
//! connections. A [`Topology`] is derived from it on demand and groups the
//! connected terminals into electrical nodes for the solver.

mod graph;
mod topology;
mod types;
mod validate;

pub use graph::Circuit;
pub use topology::{GroundSource, Node, Topology, UnionFind};
pub use types::*;
pub use validate::validate_circuit;
