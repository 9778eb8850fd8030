//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Ground, DC/AC Voltage Source, DC Current Source
//! - Nonlinear: Diode, LED, BJT
//! - Controls: Switch
//!
//! Every component carries typed properties and a typed state block. Each
//! tick the simulator hands a component its terminal voltages through a
//! [`TickContext`]; [`Component::calculate`] derives a fresh [`DeviceState`]
//! without side effects and [`Component::apply`] replaces the stored state.
//!
//! Terminal currents are signed positive into the component.

mod bjt;
mod controls;
mod diode;
mod linear;
mod sources;

pub use bjt::{Bjt, BjtParams, BjtPolarity, BjtRegion, BjtState, RegionStamp, BASE_RESISTANCE};
pub use controls::{Switch, SwitchParams, SwitchState, CLOSED_RESISTANCE, OPEN_RESISTANCE};
pub use diode::{
    Diode, DiodeParams, DiodeState, Led, LedParams, LedState, CONDUCTION_THRESHOLD, OFF_CONDUCTANCE,
    ON_RESISTANCE,
};
pub use linear::{
    Capacitor, CapacitorParams, CapacitorState, Inductor, InductorParams, InductorState, Resistor,
    ResistorParams, ResistorState, AMBIENT_TEMPERATURE,
};
pub use sources::{
    AcVoltageParams, AcVoltageSource, AcVoltageState, DcCurrentParams, DcCurrentSource,
    DcCurrentState, DcVoltageParams, DcVoltageSource, DcVoltageState, Ground, GroundState,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::{ComponentId, Terminal, TerminalRef};
use crate::error::{CircuitError, Result};

/// Component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Resistor,
    Capacitor,
    Inductor,
    Ground,
    DcVoltageSource,
    AcVoltageSource,
    DcCurrentSource,
    Diode,
    Led,
    Bjt,
    Switch,
}

/// A terminal and its offset from the component origin, in grid units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalSpec {
    pub terminal: Terminal,
    pub offset: (f64, f64),
}

const fn spec(terminal: Terminal, x: f64, y: f64) -> TerminalSpec {
    TerminalSpec {
        terminal,
        offset: (x, y),
    }
}

const LONG_TWO_TERMINAL: [TerminalSpec; 2] =
    [spec(Terminal::P1, -1.5, 0.0), spec(Terminal::P2, 1.5, 0.0)];
const SHORT_TWO_TERMINAL: [TerminalSpec; 2] =
    [spec(Terminal::P1, -1.0, 0.0), spec(Terminal::P2, 1.0, 0.0)];
const SOURCE_TERMINALS: [TerminalSpec; 2] =
    [spec(Terminal::Pos, 0.0, 1.5), spec(Terminal::Neg, 0.0, -1.5)];
const JUNCTION_TERMINALS: [TerminalSpec; 2] =
    [spec(Terminal::Anode, -1.0, 0.0), spec(Terminal::Cathode, 1.0, 0.0)];
const BJT_TERMINALS: [TerminalSpec; 3] = [
    spec(Terminal::Collector, 0.0, 1.5),
    spec(Terminal::Base, -1.5, 0.0),
    spec(Terminal::Emitter, 0.0, -1.5),
];
const GROUND_TERMINALS: [TerminalSpec; 1] = [spec(Terminal::Gnd, 0.0, -0.5)];

impl DeviceKind {
    /// Name used in documents and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Resistor => "resistor",
            DeviceKind::Capacitor => "capacitor",
            DeviceKind::Inductor => "inductor",
            DeviceKind::Ground => "ground",
            DeviceKind::DcVoltageSource => "dc_voltage_source",
            DeviceKind::AcVoltageSource => "ac_voltage_source",
            DeviceKind::DcCurrentSource => "dc_current_source",
            DeviceKind::Diode => "diode",
            DeviceKind::Led => "led",
            DeviceKind::Bjt => "bjt",
            DeviceKind::Switch => "switch",
        }
    }

    /// Declared terminals with their geometric offsets, in canonical order.
    pub fn terminal_specs(&self) -> &'static [TerminalSpec] {
        match self {
            DeviceKind::Resistor | DeviceKind::Inductor => &LONG_TWO_TERMINAL,
            DeviceKind::Capacitor | DeviceKind::Switch => &SHORT_TWO_TERMINAL,
            DeviceKind::Ground => &GROUND_TERMINALS,
            DeviceKind::DcVoltageSource | DeviceKind::AcVoltageSource | DeviceKind::DcCurrentSource => {
                &SOURCE_TERMINALS
            }
            DeviceKind::Diode | DeviceKind::Led => &JUNCTION_TERMINALS,
            DeviceKind::Bjt => &BJT_TERMINALS,
        }
    }

    /// Declared terminals in canonical order.
    pub fn terminals(&self) -> impl Iterator<Item = Terminal> {
        self.terminal_specs().iter().map(|s| s.terminal)
    }

    /// Position of `terminal` in the canonical order.
    pub fn terminal_index(&self, terminal: Terminal) -> Option<usize> {
        self.terminal_specs().iter().position(|s| s.terminal == terminal)
    }

    /// Sources that pin a voltage across their terminals.
    pub fn is_voltage_source(&self) -> bool {
        matches!(self, DeviceKind::DcVoltageSource | DeviceKind::AcVoltageSource)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============ Property Bag ============

/// Dynamically typed property value, used by editors and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Flag(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(b) => write!(f, "{}", b),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

/// A finite number.
pub(crate) fn number(kind: &'static str, name: &str, value: &PropertyValue) -> Result<f64> {
    match value {
        PropertyValue::Number(n) if n.is_finite() => Ok(*n),
        PropertyValue::Number(n) => Err(CircuitError::invalid_property(kind, name, format!("{} is not finite", n))),
        other => Err(CircuitError::invalid_property(kind, name, format!("expected a number, got '{}'", other))),
    }
}

/// A finite number greater than zero.
pub(crate) fn positive(kind: &'static str, name: &str, value: &PropertyValue) -> Result<f64> {
    let n = number(kind, name, value)?;
    if n <= 0.0 {
        return Err(CircuitError::invalid_property(kind, name, format!("must be positive, got {}", n)));
    }
    Ok(n)
}

/// A finite number greater than or equal to zero.
pub(crate) fn non_negative(kind: &'static str, name: &str, value: &PropertyValue) -> Result<f64> {
    let n = number(kind, name, value)?;
    if n < 0.0 {
        return Err(CircuitError::invalid_property(kind, name, format!("must not be negative, got {}", n)));
    }
    Ok(n)
}

pub(crate) fn flag(kind: &'static str, name: &str, value: &PropertyValue) -> Result<bool> {
    match value {
        PropertyValue::Flag(b) => Ok(*b),
        other => Err(CircuitError::invalid_property(kind, name, format!("expected true/false, got '{}'", other))),
    }
}

pub(crate) fn text(kind: &'static str, name: &str, value: &PropertyValue) -> Result<String> {
    match value {
        PropertyValue::Text(s) => Ok(s.clone()),
        other => Err(CircuitError::invalid_property(kind, name, format!("expected text, got '{}'", other))),
    }
}

// ============ Tick Inputs ============

/// Inputs to [`Component::calculate`] for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Simulation time of the instant being solved
    pub time: f64,
    /// Time step of this tick
    pub dt: f64,
    /// Terminal voltages in canonical terminal order
    pub voltages: &'a [f64],
    /// Sum of currents into the other members of the positive node
    /// (only read by voltage sources)
    pub external_current: f64,
}

impl TickContext<'_> {
    /// Voltage of the terminal at `index`, 0 if absent.
    pub fn voltage(&self, index: usize) -> f64 {
        self.voltages.get(index).copied().unwrap_or(0.0)
    }
}

// ============ Devices ============

/// Device payload: typed properties and state for one component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Device {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Ground(Ground),
    DcVoltageSource(DcVoltageSource),
    AcVoltageSource(AcVoltageSource),
    DcCurrentSource(DcCurrentSource),
    Diode(Diode),
    Led(Led),
    Bjt(Bjt),
    Switch(Switch),
}

/// A freshly derived state block, one variant per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceState {
    Resistor(ResistorState),
    Capacitor(CapacitorState),
    Inductor(InductorState),
    Ground(GroundState),
    DcVoltageSource(DcVoltageState),
    AcVoltageSource(AcVoltageState),
    DcCurrentSource(DcCurrentState),
    Diode(DiodeState),
    Led(LedState),
    Bjt(BjtState),
    Switch(SwitchState),
}

fn bool_sample(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl DeviceState {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceState::Resistor(_) => DeviceKind::Resistor,
            DeviceState::Capacitor(_) => DeviceKind::Capacitor,
            DeviceState::Inductor(_) => DeviceKind::Inductor,
            DeviceState::Ground(_) => DeviceKind::Ground,
            DeviceState::DcVoltageSource(_) => DeviceKind::DcVoltageSource,
            DeviceState::AcVoltageSource(_) => DeviceKind::AcVoltageSource,
            DeviceState::DcCurrentSource(_) => DeviceKind::DcCurrentSource,
            DeviceState::Diode(_) => DeviceKind::Diode,
            DeviceState::Led(_) => DeviceKind::Led,
            DeviceState::Bjt(_) => DeviceKind::Bjt,
            DeviceState::Switch(_) => DeviceKind::Switch,
        }
    }

    /// Terminal voltages in canonical terminal order.
    pub fn voltages(&self) -> &[f64] {
        match self {
            DeviceState::Resistor(s) => &s.voltages,
            DeviceState::Capacitor(s) => &s.voltages,
            DeviceState::Inductor(s) => &s.voltages,
            DeviceState::Ground(s) => &s.voltages,
            DeviceState::DcVoltageSource(s) => &s.voltages,
            DeviceState::AcVoltageSource(s) => &s.voltages,
            DeviceState::DcCurrentSource(s) => &s.voltages,
            DeviceState::Diode(s) => &s.voltages,
            DeviceState::Led(s) => &s.voltages,
            DeviceState::Bjt(s) => &s.voltages,
            DeviceState::Switch(s) => &s.voltages,
        }
    }

    /// Terminal currents in canonical terminal order, positive into the device.
    pub fn currents(&self) -> &[f64] {
        match self {
            DeviceState::Resistor(s) => &s.currents,
            DeviceState::Capacitor(s) => &s.currents,
            DeviceState::Inductor(s) => &s.currents,
            DeviceState::Ground(s) => &s.currents,
            DeviceState::DcVoltageSource(s) => &s.currents,
            DeviceState::AcVoltageSource(s) => &s.currents,
            DeviceState::DcCurrentSource(s) => &s.currents,
            DeviceState::Diode(s) => &s.currents,
            DeviceState::Led(s) => &s.currents,
            DeviceState::Bjt(s) => &s.currents,
            DeviceState::Switch(s) => &s.currents,
        }
    }

    /// Scalar state values worth recording in history. Flags map to 0/1,
    /// the BJT region to its [`BjtRegion::code`].
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        match self {
            DeviceState::Resistor(s) => vec![("power", s.power), ("temperature", s.temperature)],
            DeviceState::Capacitor(s) => vec![("charge", s.charge), ("energy", s.energy)],
            DeviceState::Inductor(s) => vec![("flux", s.flux), ("energy", s.energy)],
            DeviceState::Ground(_) => Vec::new(),
            DeviceState::DcVoltageSource(s) => vec![("power", s.power)],
            DeviceState::AcVoltageSource(s) => vec![
                ("power", s.power),
                ("instantaneous_voltage", s.instantaneous_voltage),
            ],
            DeviceState::DcCurrentSource(s) => vec![
                ("power", s.power),
                ("compliance_exceeded", bool_sample(s.compliance_exceeded)),
            ],
            DeviceState::Diode(s) => vec![("power", s.power), ("conducting", bool_sample(s.conducting))],
            DeviceState::Led(s) => vec![
                ("power", s.power),
                ("conducting", bool_sample(s.conducting)),
                ("brightness", s.brightness),
            ],
            DeviceState::Bjt(s) => vec![("power", s.power), ("region", s.region.code())],
            DeviceState::Switch(s) => vec![("power", s.power), ("closed", bool_sample(s.closed))],
        }
    }
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Resistor(_) => DeviceKind::Resistor,
            Device::Capacitor(_) => DeviceKind::Capacitor,
            Device::Inductor(_) => DeviceKind::Inductor,
            Device::Ground(_) => DeviceKind::Ground,
            Device::DcVoltageSource(_) => DeviceKind::DcVoltageSource,
            Device::AcVoltageSource(_) => DeviceKind::AcVoltageSource,
            Device::DcCurrentSource(_) => DeviceKind::DcCurrentSource,
            Device::Diode(_) => DeviceKind::Diode,
            Device::Led(_) => DeviceKind::Led,
            Device::Bjt(_) => DeviceKind::Bjt,
            Device::Switch(_) => DeviceKind::Switch,
        }
    }

    /// A default-valued device of the given kind.
    pub fn with_defaults(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Resistor => Device::Resistor(Resistor::default()),
            DeviceKind::Capacitor => Device::Capacitor(Capacitor::default()),
            DeviceKind::Inductor => Device::Inductor(Inductor::default()),
            DeviceKind::Ground => Device::Ground(Ground::default()),
            DeviceKind::DcVoltageSource => Device::DcVoltageSource(DcVoltageSource::default()),
            DeviceKind::AcVoltageSource => Device::AcVoltageSource(AcVoltageSource::default()),
            DeviceKind::DcCurrentSource => Device::DcCurrentSource(DcCurrentSource::default()),
            DeviceKind::Diode => Device::Diode(Diode::default()),
            DeviceKind::Led => Device::Led(Led::default()),
            DeviceKind::Bjt => Device::Bjt(Bjt::default()),
            DeviceKind::Switch => Device::Switch(Switch::default()),
        }
    }

    /// Derive the state for this tick. Pure: the device is not modified.
    pub fn calculate(&self, ctx: &TickContext) -> DeviceState {
        match self {
            Device::Resistor(d) => DeviceState::Resistor(d.calculate(ctx)),
            Device::Capacitor(d) => DeviceState::Capacitor(d.calculate(ctx)),
            Device::Inductor(d) => DeviceState::Inductor(d.calculate(ctx)),
            Device::Ground(d) => DeviceState::Ground(d.calculate(ctx)),
            Device::DcVoltageSource(d) => DeviceState::DcVoltageSource(d.calculate(ctx)),
            Device::AcVoltageSource(d) => DeviceState::AcVoltageSource(d.calculate(ctx)),
            Device::DcCurrentSource(d) => DeviceState::DcCurrentSource(d.calculate(ctx)),
            Device::Diode(d) => DeviceState::Diode(d.calculate(ctx)),
            Device::Led(d) => DeviceState::Led(d.calculate(ctx)),
            Device::Bjt(d) => DeviceState::Bjt(d.calculate(ctx)),
            Device::Switch(d) => DeviceState::Switch(d.calculate(ctx)),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> DeviceState {
        match self {
            Device::Resistor(d) => DeviceState::Resistor(d.state.clone()),
            Device::Capacitor(d) => DeviceState::Capacitor(d.state.clone()),
            Device::Inductor(d) => DeviceState::Inductor(d.state.clone()),
            Device::Ground(d) => DeviceState::Ground(d.state.clone()),
            Device::DcVoltageSource(d) => DeviceState::DcVoltageSource(d.state.clone()),
            Device::AcVoltageSource(d) => DeviceState::AcVoltageSource(d.state.clone()),
            Device::DcCurrentSource(d) => DeviceState::DcCurrentSource(d.state.clone()),
            Device::Diode(d) => DeviceState::Diode(d.state.clone()),
            Device::Led(d) => DeviceState::Led(d.state.clone()),
            Device::Bjt(d) => DeviceState::Bjt(d.state.clone()),
            Device::Switch(d) => DeviceState::Switch(d.state.clone()),
        }
    }

    /// Stored terminal currents in canonical order.
    pub fn currents(&self) -> &[f64] {
        match self {
            Device::Resistor(d) => &d.state.currents,
            Device::Capacitor(d) => &d.state.currents,
            Device::Inductor(d) => &d.state.currents,
            Device::Ground(d) => &d.state.currents,
            Device::DcVoltageSource(d) => &d.state.currents,
            Device::AcVoltageSource(d) => &d.state.currents,
            Device::DcCurrentSource(d) => &d.state.currents,
            Device::Diode(d) => &d.state.currents,
            Device::Led(d) => &d.state.currents,
            Device::Bjt(d) => &d.state.currents,
            Device::Switch(d) => &d.state.currents,
        }
    }

    /// Replace the stored state. Returns `false` and leaves the device
    /// untouched when the state belongs to another kind.
    pub fn apply(&mut self, state: DeviceState) -> bool {
        match (self, state) {
            (Device::Resistor(d), DeviceState::Resistor(s)) => d.state = s,
            (Device::Capacitor(d), DeviceState::Capacitor(s)) => d.state = s,
            (Device::Inductor(d), DeviceState::Inductor(s)) => d.state = s,
            (Device::Ground(d), DeviceState::Ground(s)) => d.state = s,
            (Device::DcVoltageSource(d), DeviceState::DcVoltageSource(s)) => d.state = s,
            (Device::AcVoltageSource(d), DeviceState::AcVoltageSource(s)) => d.state = s,
            (Device::DcCurrentSource(d), DeviceState::DcCurrentSource(s)) => d.state = s,
            (Device::Diode(d), DeviceState::Diode(s)) => d.state = s,
            (Device::Led(d), DeviceState::Led(s)) => d.state = s,
            (Device::Bjt(d), DeviceState::Bjt(s)) => d.state = s,
            (Device::Switch(d), DeviceState::Switch(s)) => d.state = s,
            _ => return false,
        }
        true
    }

    /// Restore the initial state.
    pub fn reset_state(&mut self) {
        match self {
            Device::Resistor(d) => d.state = Default::default(),
            Device::Capacitor(d) => d.state = Default::default(),
            Device::Inductor(d) => d.state = Default::default(),
            Device::Ground(d) => d.state = Default::default(),
            Device::DcVoltageSource(d) => d.state = Default::default(),
            Device::AcVoltageSource(d) => d.state = Default::default(),
            Device::DcCurrentSource(d) => d.state = Default::default(),
            Device::Diode(d) => d.state = Default::default(),
            Device::Led(d) => d.state = Default::default(),
            Device::Bjt(d) => d.state = Default::default(),
            Device::Switch(d) => d.state = d.reset_state(),
        }
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        match self {
            Device::Resistor(d) => d.property(name),
            Device::Capacitor(d) => d.property(name),
            Device::Inductor(d) => d.property(name),
            Device::Ground(_) => None,
            Device::DcVoltageSource(d) => d.property(name),
            Device::AcVoltageSource(d) => d.property(name),
            Device::DcCurrentSource(d) => d.property(name),
            Device::Diode(d) => d.property(name),
            Device::Led(d) => d.property(name),
            Device::Bjt(d) => d.property(name),
            Device::Switch(d) => d.property(name),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match self {
            Device::Resistor(d) => d.set_property(name, value),
            Device::Capacitor(d) => d.set_property(name, value),
            Device::Inductor(d) => d.set_property(name, value),
            Device::Ground(_) => Err(CircuitError::unknown_property("ground", name)),
            Device::DcVoltageSource(d) => d.set_property(name, value),
            Device::AcVoltageSource(d) => d.set_property(name, value),
            Device::DcCurrentSource(d) => d.set_property(name, value),
            Device::Diode(d) => d.set_property(name, value),
            Device::Led(d) => d.set_property(name, value),
            Device::Bjt(d) => d.set_property(name, value),
            Device::Switch(d) => d.set_property(name, value),
        }
    }
}

// ============ Component ============

/// A placed circuit element: identity, geometry, connections and device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    /// Grid position; geometry only, never used for connectivity
    #[serde(default)]
    pub position: (f64, f64),
    /// Rotation in degrees
    #[serde(default)]
    pub rotation: f64,
    #[serde(flatten)]
    pub device: Device,
    /// Peers of each terminal. Kept symmetric by [`Circuit`](crate::circuit::Circuit).
    #[serde(default)]
    connections: BTreeMap<Terminal, Vec<TerminalRef>>,
}

impl Component {
    pub fn new(id: ComponentId, device: Device) -> Self {
        Self {
            id,
            position: (0.0, 0.0),
            rotation: 0.0,
            device,
            connections: BTreeMap::new(),
        }
    }

    /// Set the position and rotation.
    pub fn with_placement(mut self, position: (f64, f64), rotation: f64) -> Self {
        self.position = position;
        self.rotation = rotation.rem_euclid(360.0);
        self
    }

    pub fn kind(&self) -> DeviceKind {
        self.device.kind()
    }

    /// Declared terminals in canonical order.
    pub fn terminals(&self) -> impl Iterator<Item = Terminal> {
        self.kind().terminals()
    }

    pub fn has_terminal(&self, terminal: Terminal) -> bool {
        self.kind().terminal_index(terminal).is_some()
    }

    /// Validate that `terminal` exists on this component.
    pub fn check_terminal(&self, terminal: Terminal) -> Result<usize> {
        self.kind()
            .terminal_index(terminal)
            .ok_or_else(|| CircuitError::unknown_terminal(self.id, self.kind().name(), terminal.as_str()))
    }

    /// Absolute grid position of a terminal after rotation.
    pub fn terminal_position(&self, terminal: Terminal) -> Option<(f64, f64)> {
        let spec = self.kind().terminal_specs().iter().find(|s| s.terminal == terminal)?;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let (x, y) = spec.offset;
        Some((
            self.position.0 + x * cos - y * sin,
            self.position.1 + x * sin + y * cos,
        ))
    }

    /// All recorded connections, keyed by local terminal.
    pub fn connections(&self) -> &BTreeMap<Terminal, Vec<TerminalRef>> {
        &self.connections
    }

    /// Peers connected to one terminal.
    pub fn peers(&self, terminal: Terminal) -> &[TerminalRef] {
        self.connections.get(&terminal).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_connected(&self, terminal: Terminal, peer: TerminalRef) -> bool {
        self.peers(terminal).contains(&peer)
    }

    pub(crate) fn add_connection(&mut self, terminal: Terminal, peer: TerminalRef) {
        self.connections.entry(terminal).or_default().push(peer);
    }

    pub(crate) fn remove_connection(&mut self, terminal: Terminal, peer: TerminalRef) -> bool {
        let Some(peers) = self.connections.get_mut(&terminal) else {
            return false;
        };
        let before = peers.len();
        peers.retain(|p| *p != peer);
        let removed = peers.len() != before;
        if peers.is_empty() {
            self.connections.remove(&terminal);
        }
        removed
    }

    /// Drop every connection pointing at `other`.
    pub(crate) fn remove_connections_to(&mut self, other: ComponentId) {
        self.connections.retain(|_, peers| {
            peers.retain(|p| p.component != other);
            !peers.is_empty()
        });
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.device.property(name)
    }

    /// Update a property. The component is unchanged on error.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.device.set_property(name, &value.into())
    }

    pub fn calculate(&self, ctx: &TickContext) -> DeviceState {
        self.device.calculate(ctx)
    }

    /// Replace the state wholesale. A state of the wrong kind is ignored with a warning.
    pub fn apply(&mut self, state: DeviceState) {
        let kind = state.kind();
        if !self.device.apply(state) {
            log::warn!(
                "Ignoring {} state for component {} ({})",
                kind,
                self.id,
                self.kind()
            );
        }
    }

    pub fn state(&self) -> DeviceState {
        self.device.state()
    }

    /// Stored current into one terminal, 0 for unknown terminals.
    pub fn terminal_current(&self, terminal: Terminal) -> f64 {
        self.kind()
            .terminal_index(terminal)
            .and_then(|i| self.device.currents().get(i).copied())
            .unwrap_or(0.0)
    }

    pub fn reset_state(&mut self) {
        self.device.reset_state();
    }
}
