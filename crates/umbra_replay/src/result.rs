//! Result of one estimate or replay call.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use umbra_core::{ExperimentId, Observable};
use umbra_estimate::{EstimateSet, ObservableEstimate, ShadowConfig};
use umbra_store::ArtifactRef;

use crate::manifest::MitigationRecord;

/// Estimates together with the artifacts they were computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Experiment the snapshots belong to
    pub experiment_id: ExperimentId,
    /// When the original estimate ran
    pub created_at: DateTime<Utc>,
    /// Register width
    pub num_qubits: usize,
    /// Configuration used
    pub shadow_config: ShadowConfig,
    /// Estimates and diagnostics
    pub estimates: EstimateSet,
    /// Raw-outcome store
    pub raw_outcomes: ArtifactRef,
    /// Confusion-matrix archive, when mitigation was applied
    pub calibration: Option<ArtifactRef>,
    /// Mitigation record
    pub mitigation: MitigationRecord,
    /// Manifest describing the experiment, once saved
    pub manifest_path: Option<PathBuf>,
}

impl EstimationResult {
    /// Estimate for `observable`
    #[must_use]
    pub fn get(&self, observable: &Observable) -> Option<&ObservableEstimate> {
        self.estimates.get(observable)
    }

    /// Whether numerical results match `other` bit for bit
    #[must_use]
    pub fn bit_identical(&self, other: &Self) -> bool {
        self.estimates.bit_identical(&other.estimates)
    }

    /// Whether any degradation was recorded
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.mitigation.degraded
            || self.mitigation.stale
            || self.estimates.has_degraded_estimates()
            || !self.estimates.diagnostics.is_empty()
    }
}
