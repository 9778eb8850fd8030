//! BJT (Bipolar Junction Transistor) model.
//!
//! A three-region switch-level model. The operating region is classified
//! from the junction voltages:
//!   cutoff:      Vbe < Vth
//!   saturation:  Vbc > 0
//!   active:      otherwise
//!
//! Base current is (Vbe - Vth) / 1kΩ and collector current is β * Ib capped
//! at the collector rating. For the stamp, each region maps to a base-emitter
//! resistance, a collector-emitter resistance and a controlled-source factor
//! applied to the previous tick's base current.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{positive, text, PropertyValue, TickContext};
use crate::error::{CircuitError, Result};

/// Input resistance used to derive base current from the junction overdrive.
pub const BASE_RESISTANCE: f64 = 1000.0;

/// BJT type (NPN or PNP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BjtPolarity {
    #[default]
    Npn,
    Pnp,
}

impl BjtPolarity {
    /// Sign applied to junction voltages and terminal currents.
    pub fn sign(&self) -> f64 {
        match self {
            BjtPolarity::Npn => 1.0,
            BjtPolarity::Pnp => -1.0,
        }
    }
}

impl fmt::Display for BjtPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BjtPolarity::Npn => write!(f, "npn"),
            BjtPolarity::Pnp => write!(f, "pnp"),
        }
    }
}

impl FromStr for BjtPolarity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npn" => Ok(BjtPolarity::Npn),
            "pnp" => Ok(BjtPolarity::Pnp),
            other => Err(format!("expected 'npn' or 'pnp', got '{}'", other)),
        }
    }
}

/// Operating region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BjtRegion {
    #[default]
    Cutoff,
    Active,
    Saturation,
}

impl BjtRegion {
    /// Numeric code for history: cutoff 0, active 1, saturation 2.
    pub fn code(self) -> f64 {
        match self {
            BjtRegion::Cutoff => 0.0,
            BjtRegion::Active => 1.0,
            BjtRegion::Saturation => 2.0,
        }
    }
}

/// Small-signal stamp values for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStamp {
    /// Base-emitter resistance
    pub rbe: f64,
    /// Collector-emitter resistance
    pub rce: f64,
    /// Multiplier on the previous base current for the collector source
    pub current_factor: f64,
}

impl BjtRegion {
    /// Stamp values for this region given the transistor gain.
    pub fn stamp(&self, gain: f64) -> RegionStamp {
        match self {
            BjtRegion::Cutoff => RegionStamp {
                rbe: 1e9,
                rce: 1e9,
                current_factor: 0.0,
            },
            BjtRegion::Saturation => RegionStamp {
                rbe: 100.0,
                rce: 0.1,
                current_factor: 1.0,
            },
            BjtRegion::Active => RegionStamp {
                rbe: 1000.0,
                rce: 1e6,
                current_factor: gain,
            },
        }
    }
}

impl fmt::Display for BjtRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BjtRegion::Cutoff => write!(f, "cutoff"),
            BjtRegion::Active => write!(f, "active"),
            BjtRegion::Saturation => write!(f, "saturation"),
        }
    }
}

/// Parameters for a BJT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BjtParams {
    #[serde(rename = "type")]
    pub polarity: BjtPolarity,
    /// Forward current gain (β)
    pub gain: f64,
    /// Base-emitter turn-on voltage
    pub vbe_threshold: f64,
    /// Collector-emitter saturation voltage. Informational only: saturation
    /// is classified from the base-collector junction and neither the
    /// stamp nor `calculate` reads this value.
    pub vce_saturation: f64,
    /// Collector current rating
    pub max_collector_current: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            polarity: BjtPolarity::Npn,
            gain: 100.0,
            vbe_threshold: 0.7,
            vce_saturation: 0.2,
            max_collector_current: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BjtState {
    /// [collector, base, emitter]
    pub voltages: [f64; 3],
    /// [collector, base, emitter], positive into the device
    pub currents: [f64; 3],
    pub power: f64,
    pub region: BjtRegion,
}

/// A bipolar junction transistor (collector, base, emitter).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bjt {
    #[serde(default)]
    pub properties: BjtParams,
    #[serde(default)]
    pub state: BjtState,
}

impl Bjt {
    const KIND: &'static str = "bjt";

    pub fn new(polarity: BjtPolarity, gain: f64) -> Self {
        Self {
            properties: BjtParams {
                polarity,
                gain,
                ..Default::default()
            },
            state: BjtState::default(),
        }
    }

    /// Signed base current from the previous tick.
    pub fn previous_base_current(&self) -> f64 {
        self.state.currents[1]
    }

    /// Classify the operating region from terminal voltages.
    pub fn region(&self, vc: f64, vb: f64, ve: f64) -> BjtRegion {
        let s = self.properties.polarity.sign();
        let vbe = s * (vb - ve);
        let vbc = s * (vb - vc);

        if vbe < self.properties.vbe_threshold {
            BjtRegion::Cutoff
        } else if vbc > 0.0 {
            BjtRegion::Saturation
        } else {
            BjtRegion::Active
        }
    }

    pub fn calculate(&self, ctx: &TickContext) -> BjtState {
        let [vc, vb, ve] = [ctx.voltage(0), ctx.voltage(1), ctx.voltage(2)];
        let p = &self.properties;
        let s = p.polarity.sign();
        let vbe = s * (vb - ve);
        let vce = s * (vc - ve);

        let region = self.region(vc, vb, ve);
        let (ib, ic) = match region {
            BjtRegion::Cutoff => (0.0, 0.0),
            BjtRegion::Active | BjtRegion::Saturation => {
                let ib = (vbe - p.vbe_threshold) / BASE_RESISTANCE;
                (ib, (p.gain * ib).min(p.max_collector_current))
            }
        };

        let power = vce * ic + vbe * ib;
        let (ib, ic) = (s * ib, s * ic);

        BjtState {
            voltages: [vc, vb, ve],
            currents: [ic, ib, -(ib + ic)],
            power,
            region,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        let p = &self.properties;
        match name {
            "type" => Some(p.polarity.to_string().into()),
            "gain" => Some(p.gain.into()),
            "vbe_threshold" => Some(p.vbe_threshold.into()),
            "vce_saturation" => Some(p.vce_saturation.into()),
            "max_collector_current" => Some(p.max_collector_current.into()),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        let p = &mut self.properties;
        match name {
            "type" => {
                p.polarity = text(Self::KIND, name, value)?
                    .parse()
                    .map_err(|msg: String| CircuitError::invalid_property(Self::KIND, name, msg))?;
            }
            "gain" => p.gain = positive(Self::KIND, name, value)?,
            "vbe_threshold" => p.vbe_threshold = positive(Self::KIND, name, value)?,
            "vce_saturation" => p.vce_saturation = positive(Self::KIND, name, value)?,
            "max_collector_current" => p.max_collector_current = positive(Self::KIND, name, value)?,
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
    fn test_npn_regions() {
        let q = Bjt::default();
        assert_eq!(q.region(5.0, 0.3, 0.0), BjtRegion::Cutoff);
        assert_eq!(q.region(5.0, 0.8, 0.0), BjtRegion::Active);
        assert_eq!(q.region(0.1, 0.8, 0.0), BjtRegion::Saturation);
    }

    #[test]
    fn test_npn_active_currents() {
        let q = Bjt::default();
        let s = q.calculate(&ctx(&[5.0, 0.8, 0.0]));
        assert_eq!(s.region, BjtRegion::Active);
        let ib = 0.1 / BASE_RESISTANCE;
        assert_relative_eq!(s.currents[1], ib, epsilon = 1e-15);
        assert_relative_eq!(s.currents[0], 100.0 * ib, epsilon = 1e-12);
        // Terminal currents balance
        assert_relative_eq!(s.currents.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(s.power, 5.0 * 100.0 * ib + 0.8 * ib, epsilon = 1e-12);
    }

    #[test]
    fn test_collector_current_limit() {
        let q = Bjt::default();
        let s = q.calculate(&ctx(&[5.0, 2.0, 0.0]));
        assert_eq!(s.currents[0], 0.5);
    }

    #[test]
    fn test_pnp_inverts_currents() {
        let q = Bjt::new(BjtPolarity::Pnp, 50.0);
        // Emitter at 5V, base pulled 0.8V below it, collector low
        let s = q.calculate(&ctx(&[0.0, 4.2, 5.0]));
        assert_eq!(s.region, BjtRegion::Active);
        assert!(s.currents[1] < 0.0);
        assert!(s.currents[0] < 0.0);
        assert!(s.currents[2] > 0.0);
    }

    #[test]
    fn test_type_property() {
        let mut q = Bjt::default();
        q.set_property("type", &PropertyValue::Text("PNP".into())).unwrap();
        assert_eq!(q.properties.polarity, BjtPolarity::Pnp);
        assert!(q.set_property("type", &PropertyValue::Text("fet".into())).is_err());
        assert_eq!(q.property("type"), Some(PropertyValue::Text("pnp".into())));
    }

    #[test]
    fn test_vce_saturation_is_informational() {
        let mut q = Bjt::default();
        q.set_property("vce_saturation", &PropertyValue::Number(1.5)).unwrap();
        assert_eq!(q.property("vce_saturation"), Some(PropertyValue::Number(1.5)));
        assert!(q.set_property("vce_saturation", &PropertyValue::Number(-0.1)).is_err());

        // Region boundaries and currents match the default device
        let reference = Bjt::default();
        for v in [[5.0, 0.8, 0.0], [0.1, 0.8, 0.0], [1.0, 0.9, 0.0]] {
            assert_eq!(q.calculate(&ctx(&v)), reference.calculate(&ctx(&v)));
        }
    }

    #[test]
    fn test_region_codes() {
        assert_eq!(BjtRegion::Cutoff.code(), 0.0);
        assert_eq!(BjtRegion::Active.code(), 1.0);
        assert_eq!(BjtRegion::Saturation.code(), 2.0);
    }
}
