//! Piecewise-linear diode and LED models.
//!
//! A junction is either conducting, modelled as a 0.1Ω resistance in series
//! with the forward voltage, or blocking, modelled as a 1nS leakage path:
//!
//!   conducting:  I = (Vd - Vf) / R_on        when Vd > 0.9 * Vf
//!   blocking:    I = G_off * Vd
//!
//! The stamp uses the classification from the previous tick, so a change of
//! state takes effect one tick later.

use serde::{Deserialize, Serialize};

use super::{non_negative, positive, text, PropertyValue, TickContext};
use crate::error::{CircuitError, Result};

/// Series resistance of a conducting junction.
pub const ON_RESISTANCE: f64 = 0.1;

/// Leakage conductance of a blocking junction.
pub const OFF_CONDUCTANCE: f64 = 1e-9;

/// Fraction of the forward voltage at which conduction starts.
pub const CONDUCTION_THRESHOLD: f64 = 0.9;

/// Junction current for a voltage drop `vd`, returning `(current, conducting)`.
fn junction(vd: f64, forward_voltage: f64, max_current: f64) -> (f64, bool) {
    if vd > CONDUCTION_THRESHOLD * forward_voltage {
        let i = (vd - forward_voltage) / ON_RESISTANCE;
        (i.min(max_current), true)
    } else {
        (OFF_CONDUCTANCE * vd, false)
    }
}

// ============ Diode ============

/// Diode parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiodeParams {
    /// Forward voltage drop, typically 0.6-0.7V for silicon
    pub forward_voltage: f64,
    /// Forward current limit
    pub max_current: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            forward_voltage: 0.7,
            max_current: 1.0,
        }
    }
}

impl DiodeParams {
    /// Parameters for a germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self {
            forward_voltage: 0.3,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiodeState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    pub conducting: bool,
}

/// A diode (anode, cathode).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diode {
    #[serde(default)]
    pub properties: DiodeParams,
    #[serde(default)]
    pub state: DiodeState,
}

impl Diode {
    const KIND: &'static str = "diode";

    pub fn new(params: DiodeParams) -> Self {
        Self {
            properties: params,
            state: DiodeState::default(),
        }
    }

    pub fn calculate(&self, ctx: &TickContext) -> DiodeState {
        let [va, vk] = [ctx.voltage(0), ctx.voltage(1)];
        let vd = va - vk;
        let (i, conducting) = junction(vd, self.properties.forward_voltage, self.properties.max_current);

        DiodeState {
            voltages: [va, vk],
            currents: [i, -i],
            power: vd * i,
            conducting,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "forward_voltage" => Some(self.properties.forward_voltage.into()),
            "max_current" => Some(self.properties.max_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "forward_voltage" => self.properties.forward_voltage = non_negative(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = positive(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

// ============ LED ============

/// LED parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedParams {
    /// Forward voltage: red ~1.8-2.0V, green ~2.2V, blue ~3.3V
    pub forward_voltage: f64,
    /// Current at full brightness
    pub max_current: f64,
    pub color: String,
}

impl Default for LedParams {
    fn default() -> Self {
        Self {
            forward_voltage: 2.0,
            max_current: 0.02,
            color: "red".to_string(),
        }
    }
}

impl LedParams {
    /// Parameters for an LED of the given color and forward voltage.
    pub fn colored(color: impl Into<String>, forward_voltage: f64) -> Self {
        Self {
            forward_voltage,
            color: color.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    pub conducting: bool,
    /// Relative brightness in [0, 1]
    pub brightness: f64,
}

/// A light emitting diode (anode, cathode).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Led {
    #[serde(default)]
    pub properties: LedParams,
    #[serde(default)]
    pub state: LedState,
}

impl Led {
    const KIND: &'static str = "led";

    pub fn new(params: LedParams) -> Self {
        Self {
            properties: params,
            state: LedState::default(),
        }
    }

    pub fn calculate(&self, ctx: &TickContext) -> LedState {
        let [va, vk] = [ctx.voltage(0), ctx.voltage(1)];
        let vd = va - vk;
        let max_current = self.properties.max_current;
        let (i, conducting) = junction(vd, self.properties.forward_voltage, max_current);

        let brightness = if conducting && i > 0.0 {
            (i / max_current).clamp(0.0, 1.0)
        } else {
            0.0
        };

        LedState {
            voltages: [va, vk],
            currents: [i, -i],
            power: vd * i,
            conducting,
            brightness,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "forward_voltage" => Some(self.properties.forward_voltage.into()),
            "max_current" => Some(self.properties.max_current.into()),
            "color" => Some(self.properties.color.clone().into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "forward_voltage" => self.properties.forward_voltage = non_negative(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = positive(Self::KIND, name, value)?,
            "color" => self.properties.color = text(Self::KIND, name, value)?,
            _ => return Err(CircuitError::unknown_property(Self::KIND, name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(voltages: &[f64]) -> TickContext<'_> {
        TickContext {
            time: 0.0,
            dt: 1e-3,
            voltages,
            external_current: 0.0,
        }
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = Diode::default();
        let s = d.calculate(&ctx(&[0.75, 0.0]));
        assert!(s.conducting);
        assert_relative_eq!(s.currents[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(s.currents[1], -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_diode_current_limit() {
        let d = Diode::default();
        let s = d.calculate(&ctx(&[5.0, 0.0]));
        assert!(s.conducting);
        assert_eq!(s.currents[0], 1.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = Diode::default();
        let s = d.calculate(&ctx(&[-5.0, 0.0]));
        assert!(!s.conducting);
        assert_relative_eq!(s.currents[0], -5e-9);

        // Just below the conduction threshold
        let s = d.calculate(&ctx(&[0.62, 0.0]));
        assert!(!s.conducting);
    }

    #[test]
    fn test_led_brightness() {
        let led = Led::default();
        let dim = led.calculate(&ctx(&[2.0005, 0.0]));
        let bright = led.calculate(&ctx(&[2.001, 0.0]));
        assert!(dim.conducting && bright.conducting);
        assert!(bright.brightness > dim.brightness);
        assert_relative_eq!(bright.brightness, 0.5, epsilon = 1e-9);

        let saturated = led.calculate(&ctx(&[3.0, 0.0]));
        assert_eq!(saturated.brightness, 1.0);

        let off = led.calculate(&ctx(&[1.0, 0.0]));
        assert!(!off.conducting);
        assert_eq!(off.brightness, 0.0);
    }

    #[test]
    fn test_led_color_property() {
        let mut led = Led::new(LedParams::colored("green", 2.2));
        assert_eq!(led.property("color"), Some(PropertyValue::Text("green".into())));
        led.set_property("color", &PropertyValue::Text("blue".into())).unwrap();
        assert_eq!(led.properties.color, "blue");
        assert!(led.set_property("color", &PropertyValue::Number(1.0)).is_err());
    }
}
