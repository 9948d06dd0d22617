//! Calibration configuration

use serde::{Deserialize, Serialize};
use umbra_core::{ShadowError, ShadowResult};
use umbra_mitigation::InversionConfig;

/// Default shots per prepared basis state
pub const DEFAULT_SHOTS_PER_STATE: u32 = 256;

/// Calibration configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Shots per prepared basis state
    pub shots_per_state: u32,
    /// Inversion thresholds for the resulting matrix
    #[serde(default)]
    pub inversion: InversionConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            shots_per_state: DEFAULT_SHOTS_PER_STATE,
            inversion: InversionConfig::default(),
        }
    }
}

impl CalibrationConfig {
    /// Set shots per state
    #[must_use]
    pub fn with_shots_per_state(mut self, shots: u32) -> Self {
        self.shots_per_state = shots;
        self
    }

    /// Set inversion thresholds
    #[must_use]
    pub fn with_inversion(mut self, inversion: InversionConfig) -> Self {
        self.inversion = inversion;
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error for zero shots or invalid inversion thresholds
    pub fn validate(&self) -> ShadowResult<()> {
        if self.shots_per_state == 0 {
            return Err(ShadowError::config("shots_per_state", "must be at least 1"));
        }
        self.inversion.validate()
    }
}
