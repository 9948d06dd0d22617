//! Binary archive for confusion matrices
//!
//! Layout: 4-byte magic, then a postcard body. The inverse is archived next to
//! the matrix so a reloaded matrix reproduces corrections bit for bit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confusion::{ConfusionMatrix, InversionMethod, InversionReport};

/// Leading bytes of every archive
pub const ARCHIVE_MAGIC: [u8; 4] = *b"UMCM";

/// Current archive body version
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Archive errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArchiveError {
    /// Input does not start with [`ARCHIVE_MAGIC`]
    #[error("not a confusion-matrix archive")]
    BadMagic,

    /// Body version newer than this build
    #[error("unsupported archive format version {0}")]
    UnsupportedFormatVersion(u32),

    /// Postcard failure
    #[error("archive encoding failed: {0}")]
    Encoding(String),

    /// Decoded body is inconsistent
    #[error("archive content invalid: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize)]
struct ArchiveBody {
    format_version: u32,
    qubits_calibrated: Vec<usize>,
    calibration_shots_per_state: u32,
    matrix: Vec<f64>,
    inverse: Vec<f64>,
    pseudo_inverse_used: bool,
    condition_number: f64,
    determinant: f64,
    timestamp: DateTime<Utc>,
}

/// Encode a confusion matrix
///
/// # Errors
///
/// Returns error if postcard fails
pub fn encode_archive(matrix: &ConfusionMatrix) -> Result<Vec<u8>, ArchiveError> {
    let report = matrix.report();
    let body = ArchiveBody {
        format_version: ARCHIVE_FORMAT_VERSION,
        qubits_calibrated: matrix.qubits().to_vec(),
        calibration_shots_per_state: matrix.shots_per_state(),
        matrix: matrix.matrix().to_vec(),
        inverse: matrix.inverse().to_vec(),
        pseudo_inverse_used: report.degraded(),
        condition_number: report.condition_number,
        determinant: report.determinant,
        timestamp: matrix.timestamp(),
    };
    let mut bytes = ARCHIVE_MAGIC.to_vec();
    let encoded = postcard::to_allocvec(&body).map_err(|e| ArchiveError::Encoding(e.to_string()))?;
    bytes.extend_from_slice(&encoded);
    Ok(bytes)
}

/// Decode a confusion matrix
///
/// # Errors
///
/// Returns error on wrong magic, newer format, undecodable body, or
/// inconsistent dimensions
pub fn decode_archive(bytes: &[u8]) -> Result<ConfusionMatrix, ArchiveError> {
    let body = bytes
        .strip_prefix(ARCHIVE_MAGIC.as_slice())
        .ok_or(ArchiveError::BadMagic)?;
    let body: ArchiveBody =
        postcard::from_bytes(body).map_err(|e| ArchiveError::Encoding(e.to_string()))?;
    if body.format_version > ARCHIVE_FORMAT_VERSION {
        return Err(ArchiveError::UnsupportedFormatVersion(body.format_version));
    }

    let report = InversionReport {
        method: if body.pseudo_inverse_used {
            InversionMethod::PseudoInverse
        } else {
            InversionMethod::Exact
        },
        condition_number: body.condition_number,
        determinant: body.determinant,
    };
    ConfusionMatrix::from_archive_parts(
        body.qubits_calibrated,
        body.calibration_shots_per_state,
        body.matrix,
        body.inverse,
        report,
        body.timestamp,
    )
    .map_err(|e| ArchiveError::Invalid(e.to_string()))
}
