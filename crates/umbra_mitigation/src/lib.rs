//! UMBRA Measurement-Error Mitigation
//!
//! Confusion matrices built from basis-state calibration, their (pseudo-)inverse,
//! and the correction applied to observed outcome distributions.
//! Nothing here talks to a backend; calibration lives in `umbra_calibrate`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod config;
pub mod confusion;

pub use archive::{ARCHIVE_FORMAT_VERSION, ARCHIVE_MAGIC, ArchiveError, decode_archive, encode_archive};
pub use config::{DEFAULT_STALENESS_BOUND_HOURS, MitigationConfig, MitigationTechnique, Staleness};
pub use confusion::{ConfusionMatrix, InversionConfig, InversionMethod, InversionReport};
