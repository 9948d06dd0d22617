//! Seed management for reproducible estimation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Namespace mixed into every derived seed
pub const SEED_NAMESPACE: &str = "umbra";

/// A seed with a derivation namespace
///
/// Derivation hashes little-endian bytes so derived seeds are identical on
/// every platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowSeed {
    /// Base seed value
    pub seed: u64,
    /// Namespace for derived seeds
    pub namespace: String,
}

impl ShadowSeed {
    /// Create a seed from a literal value
    #[must_use]
    pub fn from_literal(seed: u64) -> Self {
        Self {
            seed,
            namespace: SEED_NAMESPACE.to_string(),
        }
    }

    /// Set namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Derive a seed for a specific context
    #[must_use]
    pub fn derive(&self, context: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(&self.seed.to_le_bytes());
        hasher.write(self.namespace.as_bytes());
        hasher.write(context.as_bytes());

        Self {
            seed: hasher.finish(),
            namespace: self.namespace.clone(),
        }
    }

    /// Create RNG from seed
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

impl Default for ShadowSeed {
    fn default() -> Self {
        Self::from_literal(42)
    }
}

/// Bootstrap seed used when the caller does not pick one
#[must_use]
pub fn default_bootstrap_seed(random_seed: u64) -> u64 {
    ShadowSeed::from_literal(random_seed).derive("bootstrap").seed
}
