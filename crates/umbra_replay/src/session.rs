//! Write path: estimate, persist artifacts, and save the manifest.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};
use umbra_core::{ExperimentId, Observable, ShadowError, ShadowResult, SnapshotBatch};
use umbra_estimate::{ShadowConfig, ShadowEstimator};
use umbra_mitigation::{MitigationConfig, MitigationTechnique};
use umbra_store::{ArtifactStore, CalibrationArtifacts};

use crate::manifest::{
    BackendSnapshot, CircuitFingerprint, MANIFEST_SCHEMA_VERSION, MitigationRecord,
    ProvenanceManifest,
};
use crate::result::EstimationResult;

/// Estimation session writing into one artifact store
#[derive(Debug, Clone)]
pub struct ShadowSession {
    store: ArtifactStore,
    config: ShadowConfig,
}

impl ShadowSession {
    /// Create a session
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(store: ArtifactStore, config: ShadowConfig) -> ShadowResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Artifact store
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Shadow configuration
    #[must_use]
    pub const fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Estimate `observables` and persist the snapshots under a fresh experiment id
    ///
    /// Nothing is written unless estimation succeeds. The confusion matrix is
    /// persisted when mitigation is active.
    ///
    /// # Errors
    ///
    /// Configuration errors from the estimator, or storage errors
    pub fn estimate(
        &self,
        batch: &SnapshotBatch,
        observables: &[Observable],
        mitigation: Option<&MitigationConfig>,
    ) -> ShadowResult<EstimationResult> {
        let mitigation = mitigation.cloned().unwrap_or_default();
        mitigation.validate()?;
        let created_at = mitigation.reference_time.unwrap_or_else(Utc::now);
        let mitigation = mitigation.with_reference_time(created_at);

        if batch.len() != self.config.shadow_size {
            warn!(
                requested = self.config.shadow_size,
                received = batch.len(),
                "snapshot count differs from shadow size"
            );
        }

        let estimator = ShadowEstimator::new(self.config.clone(), Some(&mitigation))?;
        let estimates = estimator.estimate(batch, observables)?;

        let experiment_id = ExperimentId::new();
        let raw_outcomes = self.store.write_raw(&experiment_id, batch)?;
        let calibration = match mitigation.matrix().filter(|_| mitigation.is_active()) {
            Some(matrix) => Some(self.store.write_calibration(matrix)?),
            None => None,
        };
        let record =
            MitigationRecord::from_config(&mitigation, calibration.as_ref(), estimator.staleness());

        info!(
            experiment = %experiment_id,
            observables = estimates.len(),
            snapshots = batch.len(),
            technique = %mitigation.technique,
            "estimate complete"
        );

        Ok(EstimationResult {
            experiment_id,
            created_at,
            num_qubits: batch.num_qubits(),
            shadow_config: self.config.clone(),
            estimates,
            raw_outcomes,
            calibration,
            mitigation: record,
            manifest_path: None,
        })
    }

    /// Write the manifest of `result`
    ///
    /// `shadow_config` and `mitigation_config` must be the ones `result` was
    /// computed with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the arguments disagree with `result`,
    /// or a storage error
    pub fn save_manifest(
        &self,
        result: &EstimationResult,
        circuit: CircuitFingerprint,
        backend: BackendSnapshot,
        shadow_config: &ShadowConfig,
        mitigation_config: Option<&MitigationConfig>,
    ) -> ShadowResult<PathBuf> {
        if *shadow_config != result.shadow_config {
            return Err(ShadowError::config(
                "shadow_config",
                "differs from the configuration the result was computed with",
            ));
        }
        if circuit.num_qubits != result.num_qubits {
            return Err(ShadowError::QubitCountMismatch {
                context: format!("circuit {}", circuit.name),
                expected: result.num_qubits,
                actual: circuit.num_qubits,
            });
        }
        self.check_mitigation(result, mitigation_config)?;

        let manifest = ProvenanceManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            experiment_id: result.experiment_id,
            created_at: result.created_at,
            circuit,
            backend,
            shadows: result.shadow_config.clone(),
            mitigation: result.mitigation.clone(),
            raw_outcomes: result.raw_outcomes.clone(),
            results_summary: result.estimates.clone(),
        };
        manifest.validate()?;
        let json = manifest.to_json_pretty()?;
        self.store.write_manifest(&result.experiment_id, json.as_bytes())
    }

    fn check_mitigation(
        &self,
        result: &EstimationResult,
        mitigation_config: Option<&MitigationConfig>,
    ) -> ShadowResult<()> {
        let technique = mitigation_config.map_or(MitigationTechnique::None, |m| m.technique);
        if technique != result.mitigation.technique {
            return Err(ShadowError::config(
                "mitigation_config",
                format!(
                    "technique {} differs from {} recorded on the result",
                    technique, result.mitigation.technique
                ),
            ));
        }
        let Some(matrix) = mitigation_config.and_then(MitigationConfig::matrix) else {
            return Ok(());
        };
        let (_, address) = CalibrationArtifacts::encode(matrix, self.store.config().algorithm)?;
        if result.calibration.as_ref().map(|c| c.address) != Some(address) {
            return Err(ShadowError::config(
                "mitigation_config",
                "confusion matrix differs from the one the result was computed with",
            ));
        }
        Ok(())
    }
}
