//! Engine configuration loaded from JSON.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use umbra_core::{ShadowError, ShadowResult};
use umbra_estimate::ShadowConfig;
use umbra_mitigation::{ConfusionMatrix, DEFAULT_STALENESS_BOUND_HOURS, MitigationConfig};
use umbra_store::{ArtifactStore, StoreConfig};

use crate::replay::ReplayDriver;
use crate::session::ShadowSession;

/// Everything needed to open a session or a replay driver
///
/// Calibration and inversion settings live with the calibrator, which this
/// crate never links against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Shadow protocol parameters
    #[serde(default)]
    pub shadows: ShadowConfig,
    /// Artifact store layout
    #[serde(default)]
    pub store: StoreConfig,
    /// Validity window of a calibration in hours
    #[serde(default = "default_staleness")]
    pub staleness_bound_hours: f64,
}

fn default_staleness() -> f64 {
    DEFAULT_STALENESS_BOUND_HOURS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadows: ShadowConfig::default(),
            store: StoreConfig::default(),
            staleness_bound_hours: DEFAULT_STALENESS_BOUND_HOURS,
        }
    }
}

impl EngineConfig {
    /// Parse and validate
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON or invalid values
    pub fn from_json_str(json: &str) -> ShadowResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ShadowError::config("engine", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, see also
    /// [`EngineConfig::from_json_str`]
    pub fn from_json_file(path: &Path) -> ShadowResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| ShadowError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first invalid value
    pub fn validate(&self) -> ShadowResult<()> {
        self.shadows.validate()?;
        self.store.validate()?;
        if self.staleness_bound_hours.is_nan() || self.staleness_bound_hours <= 0.0 {
            return Err(ShadowError::config("staleness_bound_hours", "must be positive"));
        }
        Ok(())
    }

    /// MEM mitigation with `matrix` under the configured validity window
    #[must_use]
    pub fn mitigation(&self, matrix: Arc<ConfusionMatrix>) -> MitigationConfig {
        MitigationConfig::mem(matrix).with_staleness_bound_hours(self.staleness_bound_hours)
    }

    /// Open the store and a write-path session
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened
    pub fn open_session(&self) -> ShadowResult<ShadowSession> {
        ShadowSession::new(ArtifactStore::open(self.store.clone())?, self.shadows.clone())
    }

    /// Open the store and a replay driver
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened
    pub fn open_replay(&self) -> ShadowResult<ReplayDriver> {
        Ok(ReplayDriver::new(ArtifactStore::open(self.store.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use umbra_core::ShadowVersion;
    use umbra_estimate::SubsampleMode;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.shadows.bootstrap_resamples, 1000);
        assert!((config.staleness_bound_hours - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "shadows": {
                "version": "v1",
                "shadow_size": 500,
                "random_seed": 42,
                "bootstrap_seed": 7,
                "subsample": {"mode": "ordered_prefix", "count": 200}
            },
            "store": {"root": "/data/umbra", "algorithm": "sha256"},
            "staleness_bound_hours": 12.0
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.shadows.version, ShadowVersion::V1);
        assert_eq!(config.shadows.bootstrap_seed, 7);
        assert_eq!(config.shadows.subsample, SubsampleMode::OrderedPrefix(200));
        assert_eq!(config.store.raw_dir, "raw");
        assert_eq!(config.store.algorithm, umbra_store::AddressAlgorithm::Sha256);

        let identity = Arc::new(ConfusionMatrix::identity(vec![0], chrono::Utc::now()).unwrap());
        let mitigation = config.mitigation(identity);
        assert!(mitigation.is_active());
        assert!((mitigation.staleness_bound_hours - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"staleness_bound_hours": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(
            r#"{"shadows": {"version": "v0", "shadow_size": 10, "random_seed": 1, "bootstrap_seed": 1, "confidence_level": 1.5}}"#
        )
        .is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file_opens_store() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        let config = EngineConfig {
            store: StoreConfig::at(&root),
            ..EngineConfig::default()
        };
        let path = dir.path().join("engine.json");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
        let session = loaded.open_session().unwrap();
        assert_eq!(session.store().root(), root.as_path());
        assert!(root.join("manifests").is_dir());
        assert!(loaded.open_replay().is_ok());
        assert!(EngineConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
