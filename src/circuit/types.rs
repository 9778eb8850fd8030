//! Core types for circuit representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component in the circuit.
///
/// Ids are assigned monotonically by [`Circuit`](super::Circuit) and never
/// reused within one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Identifier of an electrical node produced by the topology resolver.
///
/// Node ids are dense and only meaningful for the topology they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Named terminal of a component.
///
/// Which terminals exist depends on the component kind; see
/// [`DeviceKind::terminals`](crate::components::DeviceKind::terminals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    P1,
    P2,
    Pos,
    Neg,
    Anode,
    Cathode,
    Collector,
    Base,
    Emitter,
    Gnd,
}

impl Terminal {
    /// Every terminal name in declaration order.
    pub const ALL: [Terminal; 10] = [
        Terminal::P1,
        Terminal::P2,
        Terminal::Pos,
        Terminal::Neg,
        Terminal::Anode,
        Terminal::Cathode,
        Terminal::Collector,
        Terminal::Base,
        Terminal::Emitter,
        Terminal::Gnd,
    ];

    /// Lowercase name used in documents and history keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminal::P1 => "p1",
            Terminal::P2 => "p2",
            Terminal::Pos => "pos",
            Terminal::Neg => "neg",
            Terminal::Anode => "anode",
            Terminal::Cathode => "cathode",
            Terminal::Collector => "collector",
            Terminal::Base => "base",
            Terminal::Emitter => "emitter",
            Terminal::Gnd => "gnd",
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Terminal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Terminal::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown terminal '{}'", s))
    }
}

/// A `(component, terminal)` pair: the unit the topology resolver groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerminalRef {
    pub component: ComponentId,
    pub terminal: Terminal,
}

impl TerminalRef {
    pub fn new(component: ComponentId, terminal: Terminal) -> Self {
        Self {
            component,
            terminal,
        }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.terminal)
    }
}
