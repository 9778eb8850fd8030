//! Control components: Switch.

use serde::{Deserialize, Serialize};

use super::{flag, positive, PropertyValue, TickContext};
use crate::error::{CircuitError, Result};

/// Resistance of a closed switch.
pub const CLOSED_RESISTANCE: f64 = 0.01;

/// Resistance of an open switch.
pub const OPEN_RESISTANCE: f64 = 1e9;

/// Switch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchParams {
    /// Requested position (true = closed)
    #[serde(rename = "state")]
    pub closed: bool,
    /// Contact current rating
    pub max_current: f64,
}

impl Default for SwitchParams {
    fn default() -> Self {
        Self {
            closed: false,
            max_current: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchState {
    pub voltages: [f64; 2],
    pub currents: [f64; 2],
    pub power: f64,
    /// Position the switch was stamped with
    pub closed: bool,
}

/// A single-pole switch.
///
/// The stamp follows `state.closed`, which tracks the `closed` property one
/// tick behind: toggling the property takes effect on the following tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    #[serde(default)]
    pub properties: SwitchParams,
    #[serde(default)]
    pub state: SwitchState,
}

impl Switch {
    const KIND: &'static str = "switch";

    /// Create a switch in the given position.
    pub fn new(closed: bool) -> Self {
        Self {
            properties: SwitchParams {
                closed,
                ..Default::default()
            },
            state: Self::initial_state(closed),
        }
    }

    fn initial_state(closed: bool) -> SwitchState {
        SwitchState {
            closed,
            ..Default::default()
        }
    }

    /// State restored by a simulation reset.
    pub fn reset_state(&self) -> SwitchState {
        Self::initial_state(self.properties.closed)
    }

    /// Resistance for a position.
    pub fn resistance(closed: bool) -> f64 {
        if closed {
            CLOSED_RESISTANCE
        } else {
            OPEN_RESISTANCE
        }
    }

    /// Toggle the requested position.
    pub fn toggle(&mut self) {
        self.properties.closed = !self.properties.closed;
    }

    pub fn calculate(&self, ctx: &TickContext) -> SwitchState {
        let [v1, v2] = [ctx.voltage(0), ctx.voltage(1)];
        let v = v1 - v2;
        let stamped = self.state.closed;

        let mut i = v / Self::resistance(stamped);
        if stamped && self.properties.max_current > 0.0 {
            i = i.clamp(-self.properties.max_current, self.properties.max_current);
        }

        SwitchState {
            voltages: [v1, v2],
            currents: [i, -i],
            power: v * i,
            closed: self.properties.closed,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "state" | "closed" => Some(self.properties.closed.into()),
            "max_current" => Some(self.properties.max_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        match name {
            "state" | "closed" => self.properties.closed = flag(Self::KIND, name, value)?,
            "max_current" => self.properties.max_current = positive(Self::KIND, name, value)?,
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
    fn test_open_switch_leaks() {
        let sw = Switch::new(false);
        let s = sw.calculate(&ctx(&[5.0, 0.0]));
        assert_relative_eq!(s.currents[0], 5e-9);
        assert!(!s.closed);
    }

    #[test]
    fn test_closed_switch_limits_current() {
        let sw = Switch::new(true);
        let s = sw.calculate(&ctx(&[1.0, 0.0]));
        assert_eq!(s.currents[0], 5.0);

        let s = sw.calculate(&ctx(&[0.01, 0.0]));
        assert_relative_eq!(s.currents[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_toggle_lags_one_tick() {
        let mut sw = Switch::new(false);
        sw.toggle();
        // Still stamped open; the new position is recorded for the next tick
        let s = sw.calculate(&ctx(&[5.0, 0.0]));
        assert!(s.closed);
        assert_relative_eq!(s.currents[0], 5e-9);
        assert!(sw.reset_state().closed);
    }
}
