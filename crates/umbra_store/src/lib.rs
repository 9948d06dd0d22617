//! UMBRA Artifact Storage
//!
//! Content-addressed files for the artifacts a manifest references: the
//! columnar raw-outcome store and confusion-matrix archives.
//! Every read is verified against the recorded address.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod calibration;
pub mod raw;
pub mod store;

pub use address::{AddressAlgorithm, ContentAddress};
pub use calibration::CalibrationArtifacts;
pub use raw::{RAW_FORMAT_VERSION, RAW_MAGIC, RawOutcomeStore, RawOutcomeWriter};
pub use store::{ArtifactRef, ArtifactStore, StoreConfig};
