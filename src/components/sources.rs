//! Independent sources and the ground reference.
//!
//! Voltage sources are stamped as a stiff Norton pair (see
//! [`SOURCE_CONDUCTANCE`](crate::solver::SOURCE_CONDUCTANCE)); their reported
//! current is derived from the rest of the positive node, so they are
//! calculated after every other component in a tick.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{non_negative, number, positive, PropertyValue, TickContext};
use crate::error::{CircuitError, Result};

/// Clamp a source current to its rating. A non-positive rating disables the clamp.
fn limit(current: f64, max_current: f64) -> f64 {
    if max_current > 0.0 {
        current.clamp(-max_current, max_current)
    } else {
        current
    }
}

// ============ Ground ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundState {
    pub voltages: [f64; 1],
    pub currents: [f64; 1],
}

/// Ground reference. Its node is the 0V reference of the circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    #[serde(default)]
    pub state: GroundState,
}

impl Ground {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calculate(&self, ctx: &TickContext) -> GroundState {
        GroundState {
            voltages: [ctx.voltage(0)],
            currents: [0.0],
        }
    }
}

// ============ DC Voltage Source ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcVoltageParams {
    /// Terminal voltage (pos - neg)
    pub voltage: f64,
    /// Current limit in amps
    pub max_current: f64,
}

impl Default for DcVoltageParams {
    fn default() -> Self {
        Self {
            voltage: 5.0,
            max_current: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcVoltageState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
}

/// An ideal DC voltage source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DcVoltageSource {
    #[serde(default)]
    pub properties: DcVoltageParams,
    #[serde(default)]
    pub state: DcVoltageState,
}

impl DcVoltageSource {
    const KIND: &'static str = "dc_voltage_source";

    pub fn new(voltage: f64) -> Self {
        Self {
            properties: DcVoltageParams {
                voltage,
                ..Default::default()
            },
            state: DcVoltageState::default(),
        }
    }

    /// Source voltage at time `t`.
    pub fn voltage(&self, _t: f64) -> f64 {
        self.properties.voltage
    }

    pub fn calculate(&self, ctx: &TickContext) -> DcVoltageState {
        let v = self.voltage(ctx.time);
        let v_neg = ctx.voltage(1);
        let i = limit(-ctx.external_current, self.properties.max_current);

        DcVoltageState {
            voltages: [v_neg + v, v_neg],
            currents: [i, -i],
            power: v * i,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "voltage" => Some(self.properties.voltage.into()),
            "max_current" => Some(self.properties.max_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "voltage" => self.properties.voltage = number(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = non_negative(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

// ============ AC Voltage Source ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcVoltageParams {
    /// Peak voltage
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    /// Phase offset in degrees
    pub phase: f64,
    /// Current limit in amps
    pub max_current: f64,
}

impl Default for AcVoltageParams {
    fn default() -> Self {
        Self {
            amplitude: 5.0,
            frequency: 1000.0,
            phase: 0.0,
            max_current: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcVoltageState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    /// v(t) at the last evaluated instant
    pub instantaneous_voltage: f64,
    /// Simulation time of the last evaluation
    pub time: f64,
}

/// A sinusoidal voltage source: v(t) = A * sin(2πft + φ).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcVoltageSource {
    #[serde(default)]
    pub properties: AcVoltageParams,
    #[serde(default)]
    pub state: AcVoltageState,
}

impl AcVoltageSource {
    const KIND: &'static str = "ac_voltage_source";

    pub fn new(amplitude: f64, frequency: f64) -> Self {
        Self {
            properties: AcVoltageParams {
                amplitude,
                frequency,
                ..Default::default()
            },
            state: AcVoltageState::default(),
        }
    }

    /// Instantaneous source voltage at time `t`.
    pub fn voltage(&self, t: f64) -> f64 {
        let p = &self.properties;
        let omega = 2.0 * PI * p.frequency;
        p.amplitude * (omega * t + p.phase.to_radians()).sin()
    }

    pub fn calculate(&self, ctx: &TickContext) -> AcVoltageState {
        let v = self.voltage(ctx.time);
        let v_neg = ctx.voltage(1);
        let i = limit(-ctx.external_current, self.properties.max_current);

        AcVoltageState {
            voltages: [v_neg + v, v_neg],
            currents: [i, -i],
            power: v * i,
            instantaneous_voltage: v,
            time: ctx.time,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "amplitude" => Some(self.properties.amplitude.into()),
            "frequency" => Some(self.properties.frequency.into()),
            "phase" => Some(self.properties.phase.into()),
            "max_current" => Some(self.properties.max_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "amplitude" => self.properties.amplitude = number(Self::KIND, name, value)?,
            "frequency" => self.properties.frequency = non_negative(Self::KIND, name, value)?,
            "phase" => self.properties.phase = number(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = non_negative(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

// ============ DC Current Source ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcCurrentParams {
    /// Source current in amps, flowing through the source from pos to neg
    pub current: f64,
    /// Compliance voltage
    pub max_voltage: f64,
}

impl Default for DcCurrentParams {
    fn default() -> Self {
        Self {
            current: 0.01,
            max_voltage: 12.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcCurrentState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    /// Terminal voltage exceeded the compliance rating
    pub compliance_exceeded: bool,
}

/// An ideal DC current source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DcCurrentSource {
    #[serde(default)]
    pub properties: DcCurrentParams,
    #[serde(default)]
    pub state: DcCurrentState,
}

impl DcCurrentSource {
    const KIND: &'static str = "dc_current_source";

    pub fn new(current: f64) -> Self {
        Self {
            properties: DcCurrentParams {
                current,
                ..Default::default()
            },
            state: DcCurrentState::default(),
        }
    }

    pub fn current(&self) -> f64 {
        self.properties.current
    }

    pub fn calculate(&self, ctx: &TickContext) -> DcCurrentState {
        let [v_pos, v_neg] = [ctx.voltage(0), ctx.voltage(1)];
        let v = v_pos - v_neg;
        let i = self.current();

        DcCurrentState {
            voltages: [v_pos, v_neg],
            currents: [i, -i],
            power: v * i,
            compliance_exceeded: v.abs() > self.properties.max_voltage,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "current" => Some(self.properties.current.into()),
            "max_voltage" => Some(self.properties.max_voltage.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "current" => self.properties.current = number(Self::KIND, name, value)?,
            "max_voltage" => self.properties.max_voltage = positive(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(time: f64, voltages: &[f64], external_current: f64) -> TickContext<'_> {
        TickContext {
            time,
            dt: 1e-3,
            voltages,
            external_current,
        }
    }

    #[test]
    fn test_dc_source_pins_voltage_and_balances_current() {
        let src = DcVoltageSource::new(9.0);
        // 3mA drawn by the rest of the positive node
        let s = src.calculate(&ctx(0.0, &[8.99, 0.5], 3e-3));
        assert_relative_eq!(s.voltages[0], 9.5);
        assert_relative_eq!(s.voltages[1], 0.5);
        assert_relative_eq!(s.currents[0], -3e-3);
        assert_relative_eq!(s.currents[1], 3e-3);
        assert_relative_eq!(s.power, -27e-3);
    }

    #[test]
    fn test_dc_source_current_limit() {
        let src = DcVoltageSource::new(5.0);
        let s = src.calculate(&ctx(0.0, &[5.0, 0.0], 10.0));
        assert_relative_eq!(s.currents[0], -1.0);
    }

    #[test]
    fn test_ac_source_waveform() {
        let src = AcVoltageSource::new(2.0, 50.0);
        assert_relative_eq!(src.voltage(0.0), 0.0);
        assert_relative_eq!(src.voltage(0.005), 2.0, epsilon = 1e-12);

        let mut shifted = src.clone();
        shifted.properties.phase = 90.0;
        assert_relative_eq!(shifted.voltage(0.0), 2.0, epsilon = 1e-12);

        let s = src.calculate(&ctx(0.005, &[0.0, 0.0], 0.0));
        assert_relative_eq!(s.instantaneous_voltage, 2.0, epsilon = 1e-12);
        assert_eq!(s.time, 0.005);
    }

    #[test]
    fn test_current_source_compliance() {
        let src = DcCurrentSource::new(0.01);
        let ok = src.calculate(&ctx(0.0, &[-10.0, 0.0], 0.0));
        assert!(!ok.compliance_exceeded);
        assert_relative_eq!(ok.currents[0], 0.01);

        let over = src.calculate(&ctx(0.0, &[-20.0, 0.0], 0.0));
        assert!(over.compliance_exceeded);
    }
}
