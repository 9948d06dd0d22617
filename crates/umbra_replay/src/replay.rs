//! Replay driver: re-estimate from persisted artifacts only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};
use umbra_core::{Observable, ShadowError, ShadowResult, SnapshotBatch};
use umbra_estimate::ShadowEstimator;
use umbra_mitigation::{ConfusionMatrix, MitigationConfig, Staleness};
use umbra_store::{ArtifactRef, ArtifactStore, ContentAddress};

use crate::manifest::ProvenanceManifest;
use crate::result::EstimationResult;

/// Loads manifests and their artifacts from one store
///
/// Confusion matrices are cached by content address and shared read-only
/// between every session the driver opens.
#[derive(Debug)]
pub struct ReplayDriver {
    store: ArtifactStore,
    matrices: RwLock<HashMap<ContentAddress, Arc<ConfusionMatrix>>>,
}

impl ReplayDriver {
    /// Create a driver over `store`
    #[must_use]
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            matrices: RwLock::new(HashMap::new()),
        }
    }

    /// Artifact store
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Replay the manifest at `manifest_path` against `observables`
    ///
    /// # Errors
    ///
    /// `ManifestVersionUnsupported`, `RawDataNotFound`, `RawDataCorrupt`,
    /// `CalibrationArtifactNotFound`, `CalibrationArtifactCorrupt`, or a
    /// configuration error for observables that do not fit the circuit
    pub fn replay(&self, manifest_path: &Path, observables: &[Observable]) -> ShadowResult<EstimationResult> {
        let manifest = ProvenanceManifest::from_file(manifest_path)?;
        let mut result = self.load_session(manifest)?.estimate(observables)?;
        result.manifest_path = Some(manifest_path.to_path_buf());
        Ok(result)
    }

    /// Replay an already loaded manifest
    ///
    /// # Errors
    ///
    /// See [`ReplayDriver::replay`]
    pub fn replay_manifest(
        &self,
        manifest: &ProvenanceManifest,
        observables: &[Observable],
    ) -> ShadowResult<EstimationResult> {
        self.load_session(manifest.clone())?.estimate(observables)
    }

    /// Load the artifacts of `manifest` for repeated evaluation
    ///
    /// Raw outcomes are loaded before the confusion matrix. A manifest that
    /// declares mitigation is never replayed without its matrix.
    ///
    /// # Errors
    ///
    /// See [`ReplayDriver::replay`]
    pub fn load_session(&self, manifest: ProvenanceManifest) -> ShadowResult<ReplaySession> {
        manifest.validate()?;
        info!(experiment = %manifest.experiment_id, "loading replay session");

        let batch = self.store.read_raw(&manifest.raw_outcomes)?;
        if batch.num_qubits() != manifest.circuit.num_qubits {
            return Err(ShadowError::RawDataCorrupt {
                path: self.store.resolve(&manifest.raw_outcomes.path),
                reason: format!(
                    "snapshots have {} qubits, circuit has {}",
                    batch.num_qubits(),
                    manifest.circuit.num_qubits
                ),
            });
        }

        let mitigation = match manifest.mitigation.artifact()? {
            Some(artifact) => {
                let matrix = self.load_matrix(&artifact)?;
                if matrix.qubits() != manifest.mitigation.qubits_calibrated.as_slice() {
                    return Err(ShadowError::CalibrationArtifactCorrupt {
                        path: self.store.resolve(&artifact.path),
                        reason: format!(
                            "archive covers qubits {:?}, manifest records {:?}",
                            matrix.qubits(),
                            manifest.mitigation.qubits_calibrated
                        ),
                    });
                }
                MitigationConfig::mem(matrix)
                    .with_staleness_bound_hours(manifest.mitigation.staleness_bound_hours)
                    .with_reference_time(manifest.created_at)
            }
            None => MitigationConfig::none().with_reference_time(manifest.created_at),
        };

        let estimator = ShadowEstimator::new(manifest.shadows.clone(), Some(&mitigation))?;
        debug!(
            experiment = %manifest.experiment_id,
            snapshots = batch.len(),
            technique = %mitigation.technique,
            "replay session ready"
        );
        Ok(ReplaySession {
            manifest,
            batch,
            mitigation,
            estimator,
        })
    }

    fn load_matrix(&self, artifact: &ArtifactRef) -> ShadowResult<Arc<ConfusionMatrix>> {
        let cached = self
            .matrices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&artifact.address)
            .cloned();
        if let Some(matrix) = cached {
            return Ok(matrix);
        }

        let matrix = Arc::new(self.store.read_calibration(artifact)?);
        self.matrices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(artifact.address, Arc::clone(&matrix));
        Ok(matrix)
    }

    /// Confusion matrices loaded so far
    #[must_use]
    pub fn cached_matrices(&self) -> usize {
        self.matrices.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Artifacts of one experiment loaded for repeated evaluation
#[derive(Debug, Clone)]
pub struct ReplaySession {
    manifest: ProvenanceManifest,
    batch: SnapshotBatch,
    mitigation: MitigationConfig,
    estimator: ShadowEstimator,
}

impl ReplaySession {
    /// Manifest the session was loaded from
    #[must_use]
    pub const fn manifest(&self) -> &ProvenanceManifest {
        &self.manifest
    }

    /// Snapshot pool in acquisition order
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotBatch {
        &self.batch
    }

    /// Shared confusion matrix, when the experiment was mitigated
    #[must_use]
    pub fn confusion_matrix(&self) -> Option<&Arc<ConfusionMatrix>> {
        self.mitigation.matrix()
    }

    /// Calibration age relative to when the experiment ran
    #[must_use]
    pub const fn staleness(&self) -> Option<Staleness> {
        self.estimator.staleness()
    }

    /// Evaluate `observables` against the stored snapshots
    ///
    /// Uses the recorded configuration and bootstrap seed, so the original
    /// observable set reproduces the original estimates bit for bit.
    ///
    /// # Errors
    ///
    /// Configuration errors for observables that do not fit the circuit
    pub fn estimate(&self, observables: &[Observable]) -> ShadowResult<EstimationResult> {
        let estimates = self.estimator.estimate(&self.batch, observables)?;
        info!(
            experiment = %self.manifest.experiment_id,
            observables = estimates.len(),
            "replayed estimate"
        );
        Ok(EstimationResult {
            experiment_id: self.manifest.experiment_id,
            created_at: self.manifest.created_at,
            num_qubits: self.manifest.circuit.num_qubits,
            shadow_config: self.manifest.shadows.clone(),
            estimates,
            raw_outcomes: self.manifest.raw_outcomes.clone(),
            calibration: self.manifest.mitigation.artifact()?,
            mitigation: self.manifest.mitigation.clone(),
            manifest_path: None,
        })
    }

    /// Re-evaluate the observables of the original run
    ///
    /// # Errors
    ///
    /// See [`ReplaySession::estimate`]
    pub fn estimate_original(&self) -> ShadowResult<EstimationResult> {
        self.estimate(&self.manifest.original_observables())
    }
}

/// Path of the manifest for `result` inside `store`
#[must_use]
pub fn manifest_location(store: &ArtifactStore, result: &EstimationResult) -> PathBuf {
    store.resolve(&store.manifest_path(&result.experiment_id))
}
