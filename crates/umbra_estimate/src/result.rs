//! Estimation results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use umbra_core::{Observable, ShadowVersion, float::bit_eq};

use crate::diagnostics::Diagnostic;

/// Health of a single estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    /// Estimate and interval are meaningful
    Ok,
    /// No snapshot matched the observable's support; expectation is 0 and
    /// variance is undefined
    InsufficientData,
    /// The snapshot pool was empty; every field is undefined
    EmptyPool,
}

/// Estimate of one observable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableEstimate {
    /// Observable estimated
    pub observable: Observable,
    /// Sample mean of single-snapshot contributions
    #[serde(with = "umbra_core::float")]
    pub expectation_value: f64,
    /// Bootstrap variance of the mean
    #[serde(with = "umbra_core::float")]
    pub variance: f64,
    /// Square root of the variance
    #[serde(with = "umbra_core::float")]
    pub std_error: f64,
    /// Lower confidence bound
    #[serde(with = "umbra_core::float")]
    pub ci_low: f64,
    /// Upper confidence bound
    #[serde(with = "umbra_core::float")]
    pub ci_high: f64,
    /// Snapshots whose bases matched the support
    pub compatible_snapshots: usize,
    /// Status
    pub status: EstimateStatus,
}

impl ObservableEstimate {
    /// Whether `value` lies inside the confidence interval
    #[must_use]
    pub fn ci_contains(&self, value: f64) -> bool {
        self.ci_low <= value && value <= self.ci_high
    }

    /// Bitwise equality of every numeric field
    #[must_use]
    pub fn bit_identical(&self, other: &Self) -> bool {
        self.observable == other.observable
            && self.status == other.status
            && self.compatible_snapshots == other.compatible_snapshots
            && bit_eq(self.expectation_value, other.expectation_value)
            && bit_eq(self.variance, other.variance)
            && bit_eq(self.std_error, other.std_error)
            && bit_eq(self.ci_low, other.ci_low)
            && bit_eq(self.ci_high, other.ci_high)
    }
}

/// Estimates of an observable set over one snapshot pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSet {
    /// Protocol version used
    pub version: ShadowVersion,
    /// Snapshots consumed
    pub num_snapshots: usize,
    /// Confidence level of the intervals
    pub confidence_level: f64,
    /// Bootstrap resamples per observable
    pub bootstrap_resamples: usize,
    /// Bootstrap seed
    pub bootstrap_seed: u64,
    /// Estimates keyed by [`Observable::key`], in request order
    pub estimates: IndexMap<String, ObservableEstimate>,
    /// Recoverable degradations
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl EstimateSet {
    /// Estimate for `observable`
    #[must_use]
    pub fn get(&self, observable: &Observable) -> Option<&ObservableEstimate> {
        self.estimates.get(&observable.key())
    }

    /// Estimate by key
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&ObservableEstimate> {
        self.estimates.get(key)
    }

    /// Estimates in request order
    pub fn iter(&self) -> impl Iterator<Item = &ObservableEstimate> {
        self.estimates.values()
    }

    /// Number of estimates
    #[must_use]
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// Whether no observable was estimated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Whether any estimate is not [`EstimateStatus::Ok`]
    #[must_use]
    pub fn has_degraded_estimates(&self) -> bool {
        self.iter().any(|e| e.status != EstimateStatus::Ok)
    }

    /// Bitwise equality of every estimate, in order
    #[must_use]
    pub fn bit_identical(&self, other: &Self) -> bool {
        self.version == other.version
            && self.num_snapshots == other.num_snapshots
            && self.bootstrap_seed == other.bootstrap_seed
            && self.estimates.len() == other.estimates.len()
            && self
                .estimates
                .iter()
                .zip(&other.estimates)
                .all(|((ka, a), (kb, b))| ka == kb && a.bit_identical(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(value: f64) -> ObservableEstimate {
        ObservableEstimate {
            observable: Observable::parse("ZZ").unwrap(),
            expectation_value: value,
            variance: 0.01,
            std_error: 0.1,
            ci_low: value - 0.2,
            ci_high: value + 0.2,
            compatible_snapshots: 10,
            status: EstimateStatus::Ok,
        }
    }

    #[test]
    fn test_bit_identical_treats_nan_equal() {
        let mut a = estimate(0.5);
        a.variance = f64::NAN;
        let b = a.clone();
        assert!(a.bit_identical(&b));
        assert_ne!(a, b);

        let mut c = a.clone();
        c.expectation_value = 0.5000000000000001;
        assert!(!a.bit_identical(&c));
    }

    #[test]
    fn test_ci_contains() {
        let e = estimate(1.0);
        assert!(e.ci_contains(1.0));
        assert!(e.ci_contains(0.8));
        assert!(!e.ci_contains(1.3));
    }

    #[test]
    fn test_json_nan_as_null() {
        let mut e = estimate(0.0);
        e.variance = f64::NAN;
        e.status = EstimateStatus::InsufficientData;
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"variance\":null"));
        assert!(json.contains("\"insufficient_data\""));
        let back: ObservableEstimate = serde_json::from_str(&json).unwrap();
        assert!(back.bit_identical(&e));
    }
}
