//! UMBRA Readout Calibration
//!
//! Drives an execution backend through every computational basis state of the
//! calibrated qubits and turns the histograms into a [`ConfusionMatrix`].
//! This is the only part of UMBRA that talks to a backend.
//!
//! [`ConfusionMatrix`]: umbra_mitigation::ConfusionMatrix

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod calibrator;
pub mod config;

pub use backend::CalibrationBackend;
pub use calibrator::{CalibrationState, Calibrator, calibrate};
pub use config::{CalibrationConfig, DEFAULT_SHOTS_PER_STATE};
pub use tokio_util::sync::CancellationToken;
