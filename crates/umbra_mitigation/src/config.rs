//! Mitigation configuration passed explicitly into every estimate and replay

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use umbra_core::{ShadowError, ShadowResult};

use crate::confusion::ConfusionMatrix;

/// Default validity window of a calibration
pub const DEFAULT_STALENESS_BOUND_HOURS: f64 = 24.0;

/// Mitigation technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MitigationTechnique {
    /// No mitigation
    #[default]
    #[serde(rename = "none")]
    None,
    /// Measurement-error mitigation through an inverted confusion matrix
    #[serde(rename = "MEM")]
    Mem,
}

impl MitigationTechnique {
    /// Name recorded in manifests
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mem => "MEM",
        }
    }
}

impl std::fmt::Display for MitigationTechnique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age of a calibration relative to the experiment it is applied to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Staleness {
    /// Hours between calibration and reference time
    pub age_hours: f64,
    /// Configured validity window
    pub bound_hours: f64,
}

impl Staleness {
    /// Whether the calibration is outside its validity window
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.age_hours > self.bound_hours
    }
}

/// Mitigation context for one estimate or replay call
///
/// The confusion matrix is held by reference and never serialized here; the
/// manifest records it as a separate content-addressed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationConfig {
    /// Technique
    pub technique: MitigationTechnique,
    /// Calibrated confusion matrix, required for [`MitigationTechnique::Mem`]
    #[serde(skip)]
    pub confusion_matrix: Option<Arc<ConfusionMatrix>>,
    /// Validity window of the calibration in hours
    pub staleness_bound_hours: f64,
    /// Time the experiment ran; defaults to the time of the call
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self::none()
    }
}

impl MitigationConfig {
    /// No mitigation
    #[must_use]
    pub const fn none() -> Self {
        Self {
            technique: MitigationTechnique::None,
            confusion_matrix: None,
            staleness_bound_hours: DEFAULT_STALENESS_BOUND_HOURS,
            reference_time: None,
        }
    }

    /// Measurement-error mitigation with a calibrated matrix
    #[must_use]
    pub const fn mem(matrix: Arc<ConfusionMatrix>) -> Self {
        Self {
            technique: MitigationTechnique::Mem,
            confusion_matrix: Some(matrix),
            staleness_bound_hours: DEFAULT_STALENESS_BOUND_HOURS,
            reference_time: None,
        }
    }

    /// Set the staleness bound
    #[must_use]
    pub fn with_staleness_bound_hours(mut self, hours: f64) -> Self {
        self.staleness_bound_hours = hours;
        self
    }

    /// Pin the reference time used for the staleness check
    #[must_use]
    pub fn with_reference_time(mut self, time: DateTime<Utc>) -> Self {
        self.reference_time = Some(time);
        self
    }

    /// Whether correction will be applied
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.technique == MitigationTechnique::Mem
    }

    /// The confusion matrix, if present
    #[must_use]
    pub fn matrix(&self) -> Option<&Arc<ConfusionMatrix>> {
        self.confusion_matrix.as_ref()
    }

    /// Check the technique and matrix agree
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::MitigationRequired`] if MEM has no matrix, and a
    /// configuration error for a bad staleness bound
    pub fn validate(&self) -> ShadowResult<()> {
        if self.staleness_bound_hours.is_nan() || self.staleness_bound_hours <= 0.0 {
            return Err(ShadowError::config(
                "staleness_bound_hours",
                "must be positive",
            ));
        }
        match (self.technique, &self.confusion_matrix) {
            (MitigationTechnique::Mem, None) => Err(ShadowError::MitigationRequired {
                reason: "MEM mitigation requires a calibrated confusion matrix".to_string(),
            }),
            (MitigationTechnique::None, Some(_)) => Err(ShadowError::MitigationRequired {
                reason: "a confusion matrix was supplied but technique is none".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Age of the matrix against `reference_time`, or `fallback` when unset
    ///
    /// Returns `None` without a matrix. A stale result is logged; it is never
    /// an error.
    #[must_use]
    pub fn staleness(&self, fallback: DateTime<Utc>) -> Option<Staleness> {
        let matrix = self.confusion_matrix.as_ref()?;
        let reference = self.reference_time.unwrap_or(fallback);
        let age = matrix.age_at(reference);
        let staleness = Staleness {
            age_hours: age.num_milliseconds() as f64 / 3_600_000.0,
            bound_hours: self.staleness_bound_hours,
        };
        if staleness.is_stale() {
            warn!(
                age_hours = staleness.age_hours,
                bound_hours = staleness.bound_hours,
                "confusion matrix is older than its validity window"
            );
        }
        Some(staleness)
    }
}
