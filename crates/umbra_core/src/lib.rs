//! UMBRA Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! All types are serializable with stable, cross-platform encoding.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;
pub mod hash;
pub mod id;
pub mod pauli;
pub mod snapshot;
pub mod version;

// Re-exports
pub use error::{ErrorKind, ShadowError, ShadowResult};
pub use hash::{Hash, HashError};
pub use id::ExperimentId;
pub use pauli::{MeasurementBasis, Observable, PauliString, Symbol, commutation_groups};
pub use snapshot::{MAX_HISTOGRAM_QUBITS, Snapshot, SnapshotBatch};
pub use version::{ShadowVersion, Version, VersionError};
