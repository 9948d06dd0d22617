//! Versioned provenance manifest.
//!
//! One JSON document per experiment. It references the raw-outcome store and
//! the confusion-matrix archive by relative path and content address, and
//! embeds everything else replay needs: the shadow configuration with both
//! seeds, the mitigation record, and the estimates it produced.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use umbra_core::{ExperimentId, Observable, ShadowError, ShadowResult, Version};
use umbra_estimate::{EstimateSet, ShadowConfig};
use umbra_mitigation::{MitigationConfig, MitigationTechnique, Staleness};
use umbra_store::{ArtifactRef, ArtifactStore, ContentAddress};

/// Newest schema this build writes and reads
pub const MANIFEST_SCHEMA_VERSION: Version = Version::new(1, 0, 0);

/// Identity of the circuit the snapshots were taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitFingerprint {
    /// Human-readable name
    pub name: String,
    /// Register width
    pub num_qubits: usize,
    /// Address of the circuit source text, when known
    #[serde(default)]
    pub source_hash: Option<ContentAddress>,
    /// Gate histogram
    #[serde(default)]
    pub gate_counts: IndexMap<String, u64>,
    /// Circuit depth
    #[serde(default)]
    pub depth: usize,
}

impl CircuitFingerprint {
    /// Fingerprint with only a name and width
    #[must_use]
    pub fn new(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            source_hash: None,
            gate_counts: IndexMap::new(),
            depth: 0,
        }
    }

    /// Fingerprint addressed by the circuit's source text
    #[must_use]
    pub fn from_source(name: impl Into<String>, num_qubits: usize, source: &str) -> Self {
        Self {
            source_hash: Some(ContentAddress::compute(source.as_bytes())),
            ..Self::new(name, num_qubits)
        }
    }

    /// Record a gate count
    #[must_use]
    pub fn with_gate_count(mut self, gate: impl Into<String>, count: u64) -> Self {
        self.gate_counts.insert(gate.into(), count);
        self
    }

    /// Record the depth
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// Backend identity and calibration properties, stored without interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSnapshot {
    /// Backend name
    pub name: String,
    /// When the backend was last calibrated by its operator
    #[serde(default)]
    pub calibration_timestamp: Option<DateTime<Utc>>,
    /// Opaque key-value properties
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
}

impl BackendSnapshot {
    /// Snapshot with a name only
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calibration_timestamp: None,
            properties: IndexMap::new(),
        }
    }

    /// Set the operator calibration timestamp
    #[must_use]
    pub fn with_calibration_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.calibration_timestamp = Some(timestamp);
        self
    }

    /// Add a property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// How readout errors were handled, and how trustworthy that handling was
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationRecord {
    /// Technique
    pub technique: MitigationTechnique,
    /// Store-relative path of the confusion-matrix archive
    pub confusion_matrix_path: Option<String>,
    /// Address of the confusion-matrix archive
    pub confusion_matrix_hash: Option<ContentAddress>,
    /// Archive size in bytes
    #[serde(default)]
    pub confusion_matrix_size_bytes: Option<u64>,
    /// Qubits the matrix covers
    #[serde(default)]
    pub qubits_calibrated: Vec<usize>,
    /// When the matrix was measured
    #[serde(default)]
    pub calibration_timestamp: Option<DateTime<Utc>>,
    /// Validity window applied
    pub staleness_bound_hours: f64,
    /// Inversion fell back to the pseudo-inverse
    #[serde(default)]
    pub degraded: bool,
    /// Condition number of the matrix; null when unmitigated or unbounded
    #[serde(with = "umbra_core::float", default = "nan")]
    pub condition_number: f64,
    /// The matrix was older than its validity window when applied
    #[serde(default)]
    pub stale: bool,
}

fn nan() -> f64 {
    f64::NAN
}

impl MitigationRecord {
    /// Record of an unmitigated run
    #[must_use]
    pub fn none() -> Self {
        Self::from_config(&MitigationConfig::none(), None, None)
    }

    /// Record `config` as applied, with its archive and staleness
    #[must_use]
    pub fn from_config(
        config: &MitigationConfig,
        artifact: Option<&ArtifactRef>,
        staleness: Option<Staleness>,
    ) -> Self {
        let matrix = config.matrix().filter(|_| config.is_active());
        Self {
            technique: config.technique,
            confusion_matrix_path: artifact.map(|a| a.path.clone()),
            confusion_matrix_hash: artifact.map(|a| a.address),
            confusion_matrix_size_bytes: artifact.map(|a| a.size_bytes),
            qubits_calibrated: matrix.map(|m| m.qubits().to_vec()).unwrap_or_default(),
            calibration_timestamp: matrix.map(|m| m.timestamp()),
            staleness_bound_hours: config.staleness_bound_hours,
            degraded: matrix.is_some_and(|m| m.pseudo_inverse_used()),
            condition_number: matrix.map_or(f64::NAN, |m| m.report().condition_number),
            stale: staleness.is_some_and(|s| s.is_stale()),
        }
    }

    /// Whether a confusion matrix must be loaded
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.technique == MitigationTechnique::Mem
    }

    /// Reference to the confusion-matrix archive
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::MitigationRequired`] if mitigation is active but
    /// the record does not locate an archive
    pub fn artifact(&self) -> ShadowResult<Option<ArtifactRef>> {
        if !self.is_active() {
            return Ok(None);
        }
        match (&self.confusion_matrix_path, self.confusion_matrix_hash) {
            (Some(path), Some(address)) => Ok(Some(ArtifactRef {
                path: path.clone(),
                address,
                size_bytes: self.confusion_matrix_size_bytes.unwrap_or(0),
            })),
            _ => Err(ShadowError::MitigationRequired {
                reason: "manifest declares MEM but does not locate a confusion matrix".to_string(),
            }),
        }
    }
}

/// Provenance manifest of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceManifest {
    /// Schema version
    #[serde(with = "version_string")]
    pub schema_version: Version,
    /// Experiment the artifacts belong to
    pub experiment_id: ExperimentId,
    /// When the estimate ran
    pub created_at: DateTime<Utc>,
    /// Circuit fingerprint
    pub circuit: CircuitFingerprint,
    /// Backend snapshot
    pub backend: BackendSnapshot,
    /// Shadow configuration, including both seeds
    pub shadows: ShadowConfig,
    /// Mitigation record
    pub mitigation: MitigationRecord,
    /// Raw-outcome store
    pub raw_outcomes: ArtifactRef,
    /// Estimates produced by the original run
    pub results_summary: EstimateSet,
}

impl ProvenanceManifest {
    /// Observables of the original run, in request order
    #[must_use]
    pub fn original_observables(&self) -> Vec<Observable> {
        self.results_summary
            .iter()
            .map(|e| e.observable.clone())
            .collect()
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the shadow configuration is invalid,
    /// or [`ShadowError::MitigationRequired`] if protocol and mitigation disagree
    pub fn validate(&self) -> ShadowResult<()> {
        if self.circuit.num_qubits == 0 {
            return Err(ShadowError::config("circuit.num_qubits", "must be at least 1"));
        }
        self.shadows.validate()?;
        match (self.shadows.mitigation_required(), self.mitigation.is_active()) {
            (true, false) => Err(ShadowError::MitigationRequired {
                reason: format!(
                    "shadow version {} requires MEM mitigation",
                    self.shadows.version
                ),
            }),
            (false, true) => Err(ShadowError::MitigationRequired {
                reason: format!(
                    "shadow version {} does not apply a confusion matrix",
                    self.shadows.version
                ),
            }),
            _ => self.mitigation.artifact().map(|_| ()),
        }
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> ShadowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate
    ///
    /// The schema version is checked before the rest of the document is
    /// interpreted.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::ManifestVersionUnsupported`] for unknown or newer
    /// schema versions and configuration errors for malformed documents
    pub fn from_json_str(json: &str) -> ShadowResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let found = value
            .get("schema_version")
            .and_then(Value::as_str)
            .ok_or_else(|| ShadowError::config("schema_version", "missing or not a string"))?;
        let unsupported = || ShadowError::ManifestVersionUnsupported {
            found: found.to_string(),
            supported: MANIFEST_SCHEMA_VERSION.to_string(),
        };
        let version = Version::parse(found).map_err(|_| unsupported())?;
        if !MANIFEST_SCHEMA_VERSION.can_read(&version) {
            return Err(unsupported());
        }

        let manifest: Self =
            serde_json::from_value(value).map_err(|e| ShadowError::config("manifest", e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, parse, and validate a manifest file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, otherwise see
    /// [`ProvenanceManifest::from_json_str`]
    pub fn from_file(path: &Path) -> ShadowResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| ShadowError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let manifest = Self::from_json_str(&json)?;
        debug!(path = %path.display(), experiment = %manifest.experiment_id, "loaded manifest");
        Ok(manifest)
    }

    /// Check that every referenced artifact exists and matches its address
    ///
    /// # Errors
    ///
    /// The first missing or corrupt artifact, as the matching data error
    pub fn verify_artifacts(&self, store: &ArtifactStore) -> ShadowResult<()> {
        store.read_raw(&self.raw_outcomes)?;
        if let Some(calibration) = self.mitigation.artifact()? {
            store.read_calibration(&calibration)?;
        }
        Ok(())
    }
}

mod version_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use umbra_core::Version;

    pub fn serialize<S: Serializer>(version: &Version, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(version)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Version, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
