//! UMBRA Shadow Estimation
//!
//! Turns a pool of randomized single-shot measurements into expectation values,
//! bootstrap variances, and confidence intervals for any number of Pauli
//! observables in one pass. Every function here is pure with respect to its
//! inputs and seeds.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod diagnostics;
pub mod estimator;
pub mod reconstruct;
pub mod result;
pub mod seed;

pub use bootstrap::{Bootstrap, BootstrapSummary, percentile};
pub use config::{DEFAULT_BOOTSTRAP_RESAMPLES, DEFAULT_CONFIDENCE_LEVEL, ShadowConfig, SubsampleMode};
pub use diagnostics::{BasisBalance, CHI_SQUARE_THRESHOLD, Diagnostic, basis_balance};
pub use estimator::{ShadowEstimator, estimate};
pub use reconstruct::{ObservablePlan, Reconstructor, snapshot_contribution};
pub use result::{EstimateSet, EstimateStatus, ObservableEstimate};
pub use seed::ShadowSeed;
