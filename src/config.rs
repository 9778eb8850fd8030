//! Simulation configuration.
//!
//! [`SimulationConfig`] carries the numeric knobs of the solver and loop.
//! It can be built in code with the `with_*` methods or loaded from a JSON
//! file; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CircuitError, Result};
use crate::persist::{read_text, write_text};
use crate::solver::{
    CONSERVATION_TOLERANCE, DEFAULT_HISTORY_LENGTH, DEFAULT_TIME_STEP, REGULARIZATION,
    SOURCE_CONDUCTANCE,
};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Default tick length in seconds.
    pub time_step: f64,
    /// Samples kept per history series before the oldest is evicted.
    pub history_length: usize,
    /// Largest per-node current imbalance (A) not reported as a violation.
    pub conservation_tolerance: f64,
    /// Added to every diagonal entry of the nodal matrix.
    pub regularization: f64,
    /// Penalty conductance tying voltage source terminals together.
    pub source_conductance: f64,
    /// Solve passes per tick. 1 stamps nonlinear devices from the previous
    /// tick only; larger values re-solve until their classification settles.
    pub max_linearization_passes: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            history_length: DEFAULT_HISTORY_LENGTH,
            conservation_tolerance: CONSERVATION_TOLERANCE,
            regularization: REGULARIZATION,
            source_conductance: SOURCE_CONDUCTANCE,
            max_linearization_passes: 1,
        }
    }
}

impl SimulationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default time step (seconds).
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Set the per-series history cap.
    pub fn with_history_length(mut self, history_length: usize) -> Self {
        self.history_length = history_length;
        self
    }

    /// Set the conservation check tolerance (amps).
    pub fn with_conservation_tolerance(mut self, tolerance: f64) -> Self {
        self.conservation_tolerance = tolerance;
        self
    }

    /// Set the diagonal regularizer.
    ///
    /// Larger values make near-floating circuits easier to solve at the cost
    /// of a small voltage error at high-impedance nodes.
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Set the voltage source penalty conductance.
    pub fn with_source_conductance(mut self, conductance: f64) -> Self {
        self.source_conductance = conductance;
        self
    }

    /// Set the number of linearization passes per tick.
    pub fn with_max_linearization_passes(mut self, passes: usize) -> Self {
        self.max_linearization_passes = passes;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(CircuitError::invalid_param(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if self.history_length == 0 {
            return Err(CircuitError::invalid_param("history_length must be at least 1"));
        }
        if !(self.conservation_tolerance >= 0.0) {
            return Err(CircuitError::invalid_param(format!(
                "conservation_tolerance must not be negative, got {}",
                self.conservation_tolerance
            )));
        }
        if !(self.regularization >= 0.0 && self.regularization.is_finite()) {
            return Err(CircuitError::invalid_param(format!(
                "regularization must be a finite non-negative value, got {}",
                self.regularization
            )));
        }
        if !(self.source_conductance > 0.0 && self.source_conductance.is_finite()) {
            return Err(CircuitError::invalid_param(format!(
                "source_conductance must be positive, got {}",
                self.source_conductance
            )));
        }
        if self.max_linearization_passes == 0 {
            return Err(CircuitError::invalid_param("max_linearization_passes must be at least 1"));
        }
        Ok(())
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = serde_json::from_str(&read_text(path.as_ref())?)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &serde_json::to_string_pretty(self)?)
    }
}
