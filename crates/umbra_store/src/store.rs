//! Artifact store rooted at one directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use umbra_core::{ExperimentId, ShadowError, ShadowResult, SnapshotBatch};
use umbra_mitigation::ConfusionMatrix;

use crate::address::{AddressAlgorithm, ContentAddress};
use crate::calibration::CalibrationArtifacts;
use crate::raw::{RawOutcomeStore, RawOutcomeWriter, write_atomic};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory; relative artifact paths resolve against it
    pub root: PathBuf,
    /// Subdirectory for raw-outcome stores
    pub raw_dir: String,
    /// Subdirectory for confusion-matrix archives
    pub calibration_dir: String,
    /// Subdirectory for provenance manifests
    pub manifest_dir: String,
    /// Hash algorithm for new artifacts
    pub algorithm: AddressAlgorithm,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".umbra"),
            raw_dir: "raw".to_string(),
            calibration_dir: "calibration".to_string(),
            manifest_dir: "manifests".to_string(),
            algorithm: AddressAlgorithm::Blake3,
        }
    }
}

impl StoreConfig {
    /// Default layout under `root`
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if a subdirectory name is empty or escapes the root
    pub fn validate(&self) -> ShadowResult<()> {
        for (field, dir) in [
            ("raw_dir", &self.raw_dir),
            ("calibration_dir", &self.calibration_dir),
            ("manifest_dir", &self.manifest_dir),
        ] {
            if dir.is_empty() || dir.contains("..") || Path::new(dir).is_absolute() {
                return Err(ShadowError::config(
                    field,
                    format!("'{}' must be a relative directory name", dir),
                ));
            }
        }
        Ok(())
    }
}

/// Location and fingerprint of a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Path relative to the store root, `/`-separated
    pub path: String,
    /// Content address of the file bytes
    pub address: ContentAddress,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Filesystem artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: StoreConfig,
}

impl ArtifactStore {
    /// Open a store, creating its directories
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or directories cannot be created
    pub fn open(config: StoreConfig) -> ShadowResult<Self> {
        config.validate()?;
        for dir in [&config.raw_dir, &config.calibration_dir, &config.manifest_dir] {
            let path = config.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| ShadowError::Io {
                path,
                reason: e.to_string(),
            })?;
        }
        Ok(Self { config })
    }

    /// Open a store with the default layout under `root`
    ///
    /// # Errors
    ///
    /// Returns error if directories cannot be created
    pub fn at(root: impl Into<PathBuf>) -> ShadowResult<Self> {
        Self::open(StoreConfig::at(root))
    }

    /// Store configuration
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Resolve a recorded path; absolute paths are returned unchanged
    #[must_use]
    pub fn resolve(&self, recorded: &str) -> PathBuf {
        let path = Path::new(recorded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        }
    }

    /// Write the raw-outcome store for `experiment`
    ///
    /// # Errors
    ///
    /// Returns error on encoding or filesystem failure
    pub fn write_raw(&self, experiment: &ExperimentId, batch: &SnapshotBatch) -> ShadowResult<ArtifactRef> {
        let recorded = format!("{}/{}.umr", self.config.raw_dir, experiment.file_stem());
        let mut writer = RawOutcomeWriter::new(batch.num_qubits());
        writer.extend(batch)?;
        let (address, size_bytes) = writer.write_to(&self.resolve(&recorded), self.config.algorithm)?;
        info!(%experiment, snapshots = batch.len(), path = %recorded, "stored raw outcomes");
        Ok(ArtifactRef {
            path: recorded,
            address,
            size_bytes,
        })
    }

    /// Read and verify a raw-outcome store
    ///
    /// # Errors
    ///
    /// `RawDataNotFound` or `RawDataCorrupt`
    pub fn read_raw(&self, artifact: &ArtifactRef) -> ShadowResult<SnapshotBatch> {
        RawOutcomeStore::read(&self.resolve(&artifact.path), &artifact.address)
    }

    /// Write a confusion-matrix archive, named by its content address
    ///
    /// Writing the same matrix twice yields the same file. An existing file
    /// whose bytes do not match the address is rewritten.
    ///
    /// # Errors
    ///
    /// Returns error on encoding or filesystem failure
    pub fn write_calibration(&self, matrix: &ConfusionMatrix) -> ShadowResult<ArtifactRef> {
        let (bytes, address) = CalibrationArtifacts::encode(matrix, self.config.algorithm)?;
        let recorded = format!("{}/{}.umcm", self.config.calibration_dir, address.hash.to_hex());
        let path = self.resolve(&recorded);
        let intact = match fs::read(&path) {
            Ok(existing) => address.verify(&existing),
            Err(_) => false,
        };
        if !intact {
            if path.exists() {
                warn!(%address, path = %path.display(), "replacing corrupt calibration artifact");
            }
            write_atomic(&path, &bytes)?;
            info!(%address, qubits = ?matrix.qubits(), "stored calibration artifact");
        }
        Ok(ArtifactRef {
            path: recorded,
            address,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Read and verify a confusion-matrix archive
    ///
    /// # Errors
    ///
    /// `CalibrationArtifactNotFound` or `CalibrationArtifactCorrupt`
    pub fn read_calibration(&self, artifact: &ArtifactRef) -> ShadowResult<ConfusionMatrix> {
        CalibrationArtifacts::read(&self.resolve(&artifact.path), &artifact.address)
    }

    /// Recorded path of the manifest for `experiment`
    #[must_use]
    pub fn manifest_path(&self, experiment: &ExperimentId) -> String {
        format!("{}/{}.json", self.config.manifest_dir, experiment.file_stem())
    }

    /// Write manifest bytes for `experiment`, returning the resolved path
    ///
    /// # Errors
    ///
    /// Returns error on filesystem failure
    pub fn write_manifest(&self, experiment: &ExperimentId, bytes: &[u8]) -> ShadowResult<PathBuf> {
        let path = self.resolve(&self.manifest_path(experiment));
        write_atomic(&path, bytes)?;
        info!(%experiment, path = %path.display(), "stored manifest");
        Ok(path)
    }
}
