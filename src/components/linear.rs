//! Linear passive components: Resistor, Capacitor, Inductor.
//!
//! Reactive elements use backward-Euler companion models:
//!   capacitor: G = C/dt in parallel with I_eq = G * v_prev
//!   inductor:  G = dt/L in parallel with I_eq = i_prev

use serde::{Deserialize, Serialize};

use super::{number, positive, PropertyValue, TickContext};
use crate::error::{CircuitError, Result};

/// Ambient temperature reported by an unloaded resistor (°C).
pub const AMBIENT_TEMPERATURE: f64 = 25.0;

/// Temperature rise at full rated power (°C).
const RATED_TEMPERATURE_RISE: f64 = 50.0;

// ============ Resistor ============

/// Resistor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistorParams {
    /// Resistance in ohms
    pub resistance: f64,
    /// Rated power in watts
    pub max_power: f64,
}

impl Default for ResistorParams {
    fn default() -> Self {
        Self {
            resistance: 1000.0,
            max_power: 0.25,
        }
    }
}

/// Per-tick resistor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistorState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    pub temperature: f64,
}

impl Default for ResistorState {
    fn default() -> Self {
        Self {
            voltages: [0.0; 2],
            currents: [0.0; 2],
            power: 0.0,
            temperature: AMBIENT_TEMPERATURE,
        }
    }
}

/// A resistor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resistor {
    #[serde(default)]
    pub properties: ResistorParams,
    #[serde(default)]
    pub state: ResistorState,
}

impl Resistor {
    const KIND: &'static str = "resistor";

    /// Create a resistor with the given resistance and default rating.
    pub fn new(resistance: f64) -> Self {
        Self {
            properties: ResistorParams {
                resistance,
                ..Default::default()
            },
            state: ResistorState::default(),
        }
    }

    /// Get the conductance (1/R). Zero for a non-positive resistance.
    pub fn conductance(&self) -> f64 {
        if self.properties.resistance > 0.0 {
            1.0 / self.properties.resistance
        } else {
            0.0
        }
    }

    pub fn calculate(&self, ctx: &TickContext) -> ResistorState {
        let [v1, v2] = [ctx.voltage(0), ctx.voltage(1)];
        let v = v1 - v2;
        let i = v * self.conductance();
        let power = v * i;

        let temperature = if power > 0.0 && self.properties.max_power > 0.0 {
            AMBIENT_TEMPERATURE + (power / self.properties.max_power) * RATED_TEMPERATURE_RISE
        } else {
            AMBIENT_TEMPERATURE
        };

        ResistorState {
            voltages: [v1, v2],
            currents: [i, -i],
            power,
            temperature,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "resistance" => Some(self.properties.resistance.into()),
            "max_power" => Some(self.properties.max_power.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "resistance" => self.properties.resistance = positive(Self::KIND, name, value)?,
            "max_power" => self.properties.max_power = positive(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

// ============ Capacitor ============

/// Capacitor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacitorParams {
    /// Capacitance in farads
    pub capacitance: f64,
    /// Rated voltage
    pub max_voltage: f64,
}

impl Default for CapacitorParams {
    fn default() -> Self {
        Self {
            capacitance: 1e-6,
            max_voltage: 50.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacitorState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    /// Stored charge Q = C * V
    pub charge: f64,
    /// Stored energy ½CV²
    pub energy: f64,
}

/// A capacitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capacitor {
    #[serde(default)]
    pub properties: CapacitorParams,
    #[serde(default)]
    pub state: CapacitorState,
}

impl Capacitor {
    const KIND: &'static str = "capacitor";

    /// Create a capacitor with the given capacitance.
    pub fn new(capacitance: f64) -> Self {
        Self {
            properties: CapacitorParams {
                capacitance,
                ..Default::default()
            },
            state: CapacitorState::default(),
        }
    }

    /// Voltage across the capacitor at the end of the previous tick.
    pub fn previous_voltage(&self) -> f64 {
        self.state.voltages[0] - self.state.voltages[1]
    }

    /// Companion conductance G = C/dt.
    pub fn conductance(&self, dt: f64) -> f64 {
        if dt > 0.0 {
            self.properties.capacitance / dt
        } else {
            0.0
        }
    }

    /// Companion current I_eq = G * v_prev, injected into p1.
    pub fn history_current(&self, dt: f64) -> f64 {
        self.conductance(dt) * self.previous_voltage()
    }

    pub fn calculate(&self, ctx: &TickContext) -> CapacitorState {
        let [v1, v2] = [ctx.voltage(0), ctx.voltage(1)];
        let v = v1 - v2;
        let c = self.properties.capacitance;
        let i = self.conductance(ctx.dt) * (v - self.previous_voltage());

        CapacitorState {
            voltages: [v1, v2],
            currents: [i, -i],
            charge: c * v,
            energy: 0.5 * c * v * v,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "capacitance" => Some(self.properties.capacitance.into()),
            "max_voltage" => Some(self.properties.max_voltage.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "capacitance" => self.properties.capacitance = positive(Self::KIND, name, value)?,
            "max_voltage" => self.properties.max_voltage = positive(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

// ============ Inductor ============

/// Inductor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InductorParams {
    /// Inductance in henries
    pub inductance: f64,
    /// Rated current
    pub max_current: f64,
}

impl Default for InductorParams {
    fn default() -> Self {
        Self {
            inductance: 1e-3,
            max_current: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InductorState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    /// Flux linkage L * i
    pub flux: f64,
    /// Stored energy ½Li²
    pub energy: f64,
}

/// An inductor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inductor {
    #[serde(default)]
    pub properties: InductorParams,
    #[serde(default)]
    pub state: InductorState,
}

impl Inductor {
    const KIND: &'static str = "inductor";

    /// Create an inductor with the given inductance.
    pub fn new(inductance: f64) -> Self {
        Self {
            properties: InductorParams {
                inductance,
                ..Default::default()
            },
            state: InductorState::default(),
        }
    }

    /// Branch current (p1 → p2) at the end of the previous tick.
    pub fn previous_current(&self) -> f64 {
        self.state.currents[0]
    }

    /// Companion conductance G = dt/L.
    pub fn conductance(&self, dt: f64) -> f64 {
        if self.properties.inductance > 0.0 {
            dt / self.properties.inductance
        } else {
            0.0
        }
    }

    pub fn calculate(&self, ctx: &TickContext) -> InductorState {
        let [v1, v2] = [ctx.voltage(0), ctx.voltage(1)];
        let l = self.properties.inductance;
        let i = self.previous_current() + (v1 - v2) * self.conductance(ctx.dt);

        InductorState {
            voltages: [v1, v2],
            currents: [i, -i],
            flux: l * i,
            energy: 0.5 * l * i * i,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "inductance" => Some(self.properties.inductance.into()),
            "max_current" => Some(self.properties.max_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "inductance" => self.properties.inductance = positive(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = number(Self::KIND, name, value)?.abs(),
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(voltages: &[f64], dt: f64) -> TickContext<'_> {
        TickContext {
            time: 0.0,
            dt,
            voltages,
            external_current: 0.0,
        }
    }

    #[test]
    fn test_resistor_ohms_law() {
        let r = Resistor::new(1000.0);
        let s = r.calculate(&ctx(&[5.0, 0.0], 1e-3));
        assert_relative_eq!(s.currents[0], 5e-3);
        assert_relative_eq!(s.currents[1], -5e-3);
        assert_relative_eq!(s.power, 0.025);
    }

    #[test]
    fn test_resistor_temperature() {
        let r = Resistor::new(100.0);
        // 1V across 100Ω = 10mW, 4% of 0.25W rating
        let s = r.calculate(&ctx(&[1.0, 0.0], 1e-3));
        assert_relative_eq!(s.temperature, 25.0 + 0.04 * 50.0, epsilon = 1e-12);

        let idle = r.calculate(&ctx(&[0.0, 0.0], 1e-3));
        assert_eq!(idle.temperature, AMBIENT_TEMPERATURE);
    }

    #[test]
    fn test_resistor_zero_resistance_draws_nothing() {
        let mut r = Resistor::new(1.0);
        r.properties.resistance = 0.0;
        let s = r.calculate(&ctx(&[3.0, 0.0], 1e-3));
        assert_eq!(s.currents, [0.0, 0.0]);
    }

    #[test]
    fn test_capacitor_charge_and_energy() {
        let c = Capacitor::new(1e-6);
        let s = c.calculate(&ctx(&[2.0, 0.0], 1e-3));
        assert_relative_eq!(s.charge, 2e-6);
        assert_relative_eq!(s.energy, 0.5 * 1e-6 * 4.0);
        // dV = 2V over 1ms through 1µF
        assert_relative_eq!(s.currents[0], 2e-3);
    }

    #[test]
    fn test_capacitor_companion_matches_calculate() {
        let mut c = Capacitor::new(1e-6);
        c.state.voltages = [1.0, 0.0];
        let dt = 1e-4;
        let s = c.calculate(&ctx(&[1.5, 0.0], dt));
        let companion = c.conductance(dt) * 1.5 - c.history_current(dt);
        assert_relative_eq!(s.currents[0], companion, epsilon = 1e-15);
    }

    #[test]
    fn test_inductor_current_integrates_voltage() {
        let mut l = Inductor::new(1e-3);
        l.state.currents = [0.1, -0.1];
        let s = l.calculate(&ctx(&[1.0, 0.0], 1e-4));
        // i = 0.1 + 1V * 1e-4 / 1e-3
        assert_relative_eq!(s.currents[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(s.flux, 2e-4, epsilon = 1e-15);
        assert_relative_eq!(s.energy, 0.5 * 1e-3 * 0.04, epsilon = 1e-15);
    }

    #[test]
    fn test_property_validation() {
        let mut r = Resistor::default();
        assert!(r.set_property("resistance", &PropertyValue::Number(-5.0)).is_err());
        assert!(r.set_property("resistance", &PropertyValue::Flag(true)).is_err());
        assert!(r.set_property("inductance", &PropertyValue::Number(1.0)).is_err());
        assert_eq!(r.properties.resistance, 1000.0);

        r.set_property("resistance", &PropertyValue::Number(470.0)).unwrap();
        assert_eq!(r.property("resistance"), Some(PropertyValue::Number(470.0)));
    }
}
