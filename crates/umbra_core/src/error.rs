//! Error taxonomy shared by every UMBRA crate.
//!
//! Fatal conditions are distinct variants so callers can branch on them.
//! Numerical degradation (pseudo-inverse fallback, poorly supported
//! observables, empty pools) is not an error and never appears here.

use std::path::PathBuf;

/// Result type used across UMBRA
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Coarse classification of a [`ShadowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input or configuration, detected before any computation
    Configuration,
    /// A referenced artifact does not exist
    DataAvailability,
    /// A referenced artifact exists but does not match its recorded hash
    DataIntegrity,
    /// Calibration was not completed or was aborted
    Calibration,
    /// The execution backend failed during calibration
    Backend,
    /// Filesystem or encoding failure unrelated to artifact integrity
    Io,
}

/// Error type for shadow estimation, mitigation and replay
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShadowError {
    /// Observable or snapshot width differs from the circuit width
    #[error("qubit count mismatch for {context}: expected {expected}, got {actual}")]
    QubitCountMismatch {
        /// What was being checked (an observable key, a snapshot index, ...)
        context: String,
        /// Qubit count of the circuit
        expected: usize,
        /// Qubit count found
        actual: usize,
    },

    /// Unparseable Pauli symbol or string
    #[error("invalid Pauli string: {reason}")]
    InvalidPauli {
        /// Reason
        reason: String,
    },

    /// Malformed snapshot
    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot {
        /// Reason
        reason: String,
    },

    /// Unknown shadow protocol version tag
    #[error("unsupported shadow version: {0}")]
    UnsupportedShadowVersion(String),

    /// Manifest schema version not understood by this build
    #[error("manifest schema version {found} is not supported (supported: {supported})")]
    ManifestVersionUnsupported {
        /// Version found in the manifest
        found: String,
        /// Newest version this build reads
        supported: String,
    },

    /// Noise-aware estimation requested without a confusion matrix, or the reverse
    #[error("mitigation configuration invalid: {reason}")]
    MitigationRequired {
        /// Reason
        reason: String,
    },

    /// Invalid or inconsistent configuration value
    #[error("configuration mismatch for {field}: {reason}")]
    ConfigMismatch {
        /// Offending field
        field: String,
        /// Reason
        reason: String,
    },

    /// Raw-outcome store missing
    #[error("raw outcome store not found: {}", .path.display())]
    RawDataNotFound {
        /// Resolved path
        path: PathBuf,
    },

    /// Raw-outcome store present but unusable
    #[error("raw outcome store corrupt at {}: {reason}", .path.display())]
    RawDataCorrupt {
        /// Resolved path
        path: PathBuf,
        /// Reason (hash mismatch, undecodable, ...)
        reason: String,
    },

    /// Confusion-matrix artifact missing
    #[error("calibration artifact not found: {}", .path.display())]
    CalibrationArtifactNotFound {
        /// Resolved path
        path: PathBuf,
    },

    /// Confusion-matrix artifact present but unusable
    #[error("calibration artifact corrupt at {}: {reason}", .path.display())]
    CalibrationArtifactCorrupt {
        /// Resolved path
        path: PathBuf,
        /// Reason
        reason: String,
    },

    /// Confusion matrix requested from a calibrator that is not CALIBRATED
    #[error("calibrator is not calibrated (state: {state})")]
    NotCalibrated {
        /// Current state name
        state: String,
    },

    /// Calibration aborted between basis-state rounds
    #[error("calibration cancelled after {completed} of {total} basis states")]
    CalibrationCancelled {
        /// Rounds completed
        completed: usize,
        /// Rounds requested
        total: usize,
    },

    /// Backend request failed
    #[error("backend request failed: {0}")]
    Backend(String),

    /// Filesystem error
    #[error("io error at {}: {reason}", .path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Reason
        reason: String,
    },

    /// Encoding or decoding failure outside artifact reads
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ShadowError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::QubitCountMismatch { .. }
            | Self::InvalidPauli { .. }
            | Self::InvalidSnapshot { .. }
            | Self::UnsupportedShadowVersion(_)
            | Self::ManifestVersionUnsupported { .. }
            | Self::MitigationRequired { .. }
            | Self::ConfigMismatch { .. } => ErrorKind::Configuration,
            Self::RawDataNotFound { .. } | Self::CalibrationArtifactNotFound { .. } => {
                ErrorKind::DataAvailability
            }
            Self::RawDataCorrupt { .. } | Self::CalibrationArtifactCorrupt { .. } => {
                ErrorKind::DataIntegrity
            }
            Self::NotCalibrated { .. } | Self::CalibrationCancelled { .. } => {
                ErrorKind::Calibration
            }
            Self::Backend(_) => ErrorKind::Backend,
            Self::Io { .. } | Self::Encoding(_) => ErrorKind::Io,
        }
    }

    /// Whether retrying the same call could succeed
    ///
    /// Missing or corrupt artifacts never heal on their own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Backend | ErrorKind::Io)
    }

    /// Shorthand for a configuration error on a named field
    #[must_use]
    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::ConfigMismatch {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ShadowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<postcard::Error> for ShadowError {
    fn from(err: postcard::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShadowError::QubitCountMismatch {
            context: "1.0*ZZ".to_string(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            format!("{}", err),
            "qubit count mismatch for 1.0*ZZ: expected 3, got 2"
        );

        let err = ShadowError::RawDataNotFound {
            path: PathBuf::from("raw/exp.umr"),
        };
        assert!(err.to_string().contains("raw/exp.umr"));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let missing = ShadowError::RawDataNotFound {
            path: PathBuf::from("a"),
        };
        let corrupt = ShadowError::RawDataCorrupt {
            path: PathBuf::from("a"),
            reason: "hash mismatch".to_string(),
        };
        let no_cal = ShadowError::CalibrationArtifactNotFound {
            path: PathBuf::from("b"),
        };
        let version = ShadowError::ManifestVersionUnsupported {
            found: "9.0.0".to_string(),
            supported: "1.0.0".to_string(),
        };

        assert_eq!(missing.kind(), ErrorKind::DataAvailability);
        assert_eq!(corrupt.kind(), ErrorKind::DataIntegrity);
        assert_eq!(no_cal.kind(), ErrorKind::DataAvailability);
        assert_eq!(version.kind(), ErrorKind::Configuration);
        assert_ne!(missing, no_cal);
    }

    #[test]
    fn test_data_errors_not_retryable() {
        let err = ShadowError::RawDataNotFound {
            path: PathBuf::from("gone"),
        };
        assert!(!err.is_retryable());

        let err = ShadowError::Backend("timeout".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_shorthand() {
        let err = ShadowError::config("confidence_level", "must be in (0, 1)");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("confidence_level"));
    }
}
