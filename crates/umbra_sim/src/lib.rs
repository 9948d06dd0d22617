//! UMBRA Deterministic Simulation
//!
//! Small state-vector backend used by tests: randomized Pauli-basis snapshots
//! and basis-state calibration under configurable readout noise.
//! All sampling is reproducible from a seed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod noise;
pub mod sampler;
pub mod state;

pub use noise::{NoisyReadoutBackend, ReadoutNoise};
pub use sampler::{sample_noisy_snapshots, sample_snapshots};
pub use state::StateVector;
