//! UMBRA Provenance and Replay
//!
//! The write path persists every snapshot of an estimate together with the
//! calibration it used, and records both in a versioned manifest. The replay
//! driver reloads those artifacts and evaluates any observable set against
//! them without touching an execution backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod manifest;
pub mod replay;
pub mod result;
pub mod session;

pub use config::EngineConfig;
pub use manifest::{
    BackendSnapshot, CircuitFingerprint, MANIFEST_SCHEMA_VERSION, MitigationRecord,
    ProvenanceManifest,
};
pub use replay::{ReplayDriver, ReplaySession, manifest_location};
pub use result::EstimationResult;
pub use session::ShadowSession;
