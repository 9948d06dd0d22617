//! Shadow protocol configuration

use serde::{Deserialize, Serialize};
use umbra_core::{ShadowError, ShadowResult, ShadowVersion};

use crate::seed::default_bootstrap_seed;

/// Default number of bootstrap resamples
pub const DEFAULT_BOOTSTRAP_RESAMPLES: usize = 1000;

/// Default two-sided confidence level
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Which snapshots of the pool an estimate consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "count")]
pub enum SubsampleMode {
    /// Every snapshot
    #[default]
    Full,
    /// The first `n` snapshots in acquisition order
    OrderedPrefix(usize),
}

/// Parameters of one classical-shadow experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Protocol version
    pub version: ShadowVersion,
    /// Number of snapshots requested from the backend
    pub shadow_size: usize,
    /// Seed of the basis sampling
    pub random_seed: u64,
    /// Seed of the bootstrap resampler
    pub bootstrap_seed: u64,
    /// Bootstrap resamples per observable
    #[serde(default = "default_resamples")]
    pub bootstrap_resamples: usize,
    /// Two-sided confidence level of the reported interval
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    /// Subsampling mode
    #[serde(default)]
    pub subsample: SubsampleMode,
}

fn default_resamples() -> usize {
    DEFAULT_BOOTSTRAP_RESAMPLES
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

impl ShadowConfig {
    /// v0 configuration with a bootstrap seed derived from `random_seed`
    #[must_use]
    pub fn new(shadow_size: usize, random_seed: u64) -> Self {
        Self {
            version: ShadowVersion::V0,
            shadow_size,
            random_seed,
            bootstrap_seed: default_bootstrap_seed(random_seed),
            bootstrap_resamples: DEFAULT_BOOTSTRAP_RESAMPLES,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            subsample: SubsampleMode::Full,
        }
    }

    /// Set protocol version
    #[must_use]
    pub fn with_version(mut self, version: ShadowVersion) -> Self {
        self.version = version;
        self
    }

    /// Override the bootstrap seed
    #[must_use]
    pub fn with_bootstrap_seed(mut self, seed: u64) -> Self {
        self.bootstrap_seed = seed;
        self
    }

    /// Set resample count
    #[must_use]
    pub fn with_bootstrap_resamples(mut self, resamples: usize) -> Self {
        self.bootstrap_resamples = resamples;
        self
    }

    /// Set confidence level
    #[must_use]
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Set subsampling mode
    #[must_use]
    pub fn with_subsample(mut self, mode: SubsampleMode) -> Self {
        self.subsample = mode;
        self
    }

    /// Whether mitigation must accompany this configuration
    #[must_use]
    pub const fn mitigation_required(&self) -> bool {
        self.version.is_noise_aware()
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error for a zero shadow size, zero resamples, a confidence level
    /// outside (0, 1), or a zero-length prefix
    pub fn validate(&self) -> ShadowResult<()> {
        if self.shadow_size == 0 {
            return Err(ShadowError::config("shadow_size", "must be at least 1"));
        }
        if self.bootstrap_resamples == 0 {
            return Err(ShadowError::config(
                "bootstrap_resamples",
                "must be at least 1",
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ShadowError::config(
                "confidence_level",
                format!("{} is outside (0, 1)", self.confidence_level),
            ));
        }
        if self.subsample == SubsampleMode::OrderedPrefix(0) {
            return Err(ShadowError::config(
                "subsample",
                "ordered prefix must keep at least one snapshot",
            ));
        }
        Ok(())
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self::new(1000, 42)
    }
}
