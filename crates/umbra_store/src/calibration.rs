//! Confusion-matrix artifacts on disk.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use umbra_core::{ShadowError, ShadowResult};
use umbra_mitigation::{ConfusionMatrix, decode_archive, encode_archive};

use crate::address::{AddressAlgorithm, ContentAddress};
use crate::raw::write_atomic;

/// Verified writes and reads of confusion-matrix archives
pub struct CalibrationArtifacts;

impl CalibrationArtifacts {
    /// Encode `matrix` and its content address without touching disk
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn encode(matrix: &ConfusionMatrix, algorithm: AddressAlgorithm) -> ShadowResult<(Vec<u8>, ContentAddress)> {
        let bytes = encode_archive(matrix).map_err(|e| ShadowError::Encoding(e.to_string()))?;
        let address = ContentAddress::compute_with(&bytes, algorithm);
        Ok((bytes, address))
    }

    /// Write `matrix` to `path`, returning its content address and size
    ///
    /// # Errors
    ///
    /// Returns error on encoding or filesystem failure
    pub fn write(
        path: &Path,
        matrix: &ConfusionMatrix,
        algorithm: AddressAlgorithm,
    ) -> ShadowResult<(ContentAddress, u64)> {
        let (bytes, address) = Self::encode(matrix, algorithm)?;
        write_atomic(path, &bytes)?;
        debug!(path = %path.display(), %address, qubits = ?matrix.qubits(), "wrote calibration artifact");
        Ok((address, bytes.len() as u64))
    }

    /// Read and verify the archive at `path`
    ///
    /// # Errors
    ///
    /// `CalibrationArtifactNotFound` if the file is absent,
    /// `CalibrationArtifactCorrupt` on hash mismatch or undecodable content
    pub fn read(path: &Path, expected: &ContentAddress) -> ShadowResult<ConfusionMatrix> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShadowError::CalibrationArtifactNotFound {
                path: path.to_path_buf(),
            },
            _ => ShadowError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        if !expected.verify(&bytes) {
            let actual = ContentAddress::compute_with(&bytes, expected.algorithm());
            warn!(path = %path.display(), %expected, %actual, "calibration artifact hash mismatch");
            return Err(ShadowError::CalibrationArtifactCorrupt {
                path: path.to_path_buf(),
                reason: format!("content hash mismatch: expected {}, found {}", expected, actual),
            });
        }

        decode_archive(&bytes).map_err(|e| ShadowError::CalibrationArtifactCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use umbra_mitigation::InversionConfig;

    fn matrix() -> ConfusionMatrix {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        ConfusionMatrix::from_counts(
            vec![0, 1],
            100,
            &[
                vec![90, 5, 4, 1],
                vec![6, 88, 1, 5],
                vec![5, 1, 89, 5],
                vec![1, 4, 6, 89],
            ],
            ts,
            &InversionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_write_read_is_exact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calibration").join("cm.umcm");
        let original = matrix();
        let (address, size) = CalibrationArtifacts::write(&path, &original, AddressAlgorithm::Blake3).unwrap();
        assert!(size > 0);

        let read = CalibrationArtifacts::read(&path, &address).unwrap();
        assert_eq!(read.qubits(), original.qubits());
        assert_eq!(read.timestamp(), original.timestamp());
        for (a, b) in read.inverse().iter().zip(original.inverse()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let (a, addr_a) = CalibrationArtifacts::encode(&matrix(), AddressAlgorithm::Blake3).unwrap();
        let (b, addr_b) = CalibrationArtifacts::encode(&matrix(), AddressAlgorithm::Blake3).unwrap();
        assert_eq!(a, b);
        assert_eq!(addr_a, addr_b);
    }

    #[test]
    fn test_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CalibrationArtifacts::read(&dir.path().join("gone.umcm"), &ContentAddress::compute(b""))
            .unwrap_err();
        assert!(matches!(err, ShadowError::CalibrationArtifactNotFound { .. }));
    }

    #[test]
    fn test_tampered_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cm.umcm");
        let (address, _) = CalibrationArtifacts::write(&path, &matrix(), AddressAlgorithm::Blake3).unwrap();
        fs::write(&path, b"UMCMgarbage").unwrap();
        let err = CalibrationArtifacts::read(&path, &address).unwrap_err();
        assert!(matches!(err, ShadowError::CalibrationArtifactCorrupt { .. }));

        // Hash matches but content is not an archive
        let address = ContentAddress::compute(b"UMCMgarbage");
        let err = CalibrationArtifacts::read(&path, &address).unwrap_err();
        assert!(matches!(err, ShadowError::CalibrationArtifactCorrupt { .. }));
    }
}
