//! Seeded non-parametric bootstrap over per-snapshot contributions.

use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::seed::ShadowSeed;

/// Bootstrap parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    /// Number of resamples
    pub resamples: usize,
    /// Two-sided confidence level
    pub confidence_level: f64,
    /// Resampler seed
    pub seed: u64,
}

/// Variance and percentile interval of the bootstrap means
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSummary {
    /// Population variance of the resampled means
    pub variance: f64,
    /// Lower percentile
    pub ci_low: f64,
    /// Upper percentile
    pub ci_high: f64,
}

impl BootstrapSummary {
    /// Summary with every field undefined
    #[must_use]
    pub const fn undefined() -> Self {
        Self {
            variance: f64::NAN,
            ci_low: f64::NAN,
            ci_high: f64::NAN,
        }
    }
}

impl Bootstrap {
    /// Resample `values` with replacement
    ///
    /// The resampler is re-seeded on every call, so each observable draws the
    /// same index sequence no matter which other observables share the pool.
    #[must_use]
    pub fn run(&self, values: &[f64]) -> BootstrapSummary {
        let n = values.len();
        if n == 0 || self.resamples == 0 {
            return BootstrapSummary::undefined();
        }

        let mut rng = ShadowSeed::from_literal(self.seed).rng();
        let index = Uniform::new(0, n);
        let mut means = Vec::with_capacity(self.resamples);
        for _ in 0..self.resamples {
            let mut sum = 0.0;
            for _ in 0..n {
                sum += values[index.sample(&mut rng)];
            }
            means.push(sum / n as f64);
        }

        let b = means.len() as f64;
        let center = means.iter().sum::<f64>() / b;
        let variance = means.iter().map(|m| (m - center).powi(2)).sum::<f64>() / b;

        means.sort_by(f64::total_cmp);
        let tail = (1.0 - self.confidence_level) / 2.0;
        BootstrapSummary {
            variance,
            ci_low: percentile(&means, tail),
            ci_high: percentile(&means, 1.0 - tail),
        }
    }
}

/// Linearly interpolated percentile of sorted data, `q` in [0, 1]
///
/// Returns NaN for empty input.
#[must_use]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let h = (len - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            if lo + 1 >= len {
                return sorted[len - 1];
            }
            sorted[lo] + (h - lo as f64) * (sorted[lo + 1] - sorted[lo])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap(seed: u64) -> Bootstrap {
        Bootstrap {
            resamples: 500,
            confidence_level: 0.95,
            seed,
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 1.0), 5.0);
        assert_eq!(percentile(&data, 0.5), 3.0);
        assert!((percentile(&data, 0.1) - 1.4).abs() < 1e-12);
        assert!(percentile(&[], 0.5).is_nan());
        assert_eq!(percentile(&[7.0], 0.3), 7.0);
    }

    #[test]
    fn test_constant_values_have_zero_variance() {
        let summary = bootstrap(1).run(&[2.0; 50]);
        assert_eq!(summary.variance, 0.0);
        assert_eq!(summary.ci_low, 2.0);
        assert_eq!(summary.ci_high, 2.0);
    }

    #[test]
    fn test_empty_is_undefined() {
        let summary = bootstrap(1).run(&[]);
        assert!(summary.variance.is_nan());
        assert!(summary.ci_low.is_nan());
    }

    #[test]
    fn test_same_seed_bit_identical() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 11) as f64 - 5.0).collect();
        let a = bootstrap(9).run(&values);
        let b = bootstrap(9).run(&values);
        assert_eq!(a.variance.to_bits(), b.variance.to_bits());
        assert_eq!(a.ci_low.to_bits(), b.ci_low.to_bits());
        assert_eq!(a.ci_high.to_bits(), b.ci_high.to_bits());

        let c = bootstrap(10).run(&values);
        assert_ne!(a.variance.to_bits(), c.variance.to_bits());
    }

    #[test]
    fn test_variance_near_standard_error() {
        // ±3 with equal weight: per-sample variance 9, so Var(mean) ≈ 9/n
        let values: Vec<f64> = (0..400).map(|i| if i % 2 == 0 { 3.0 } else { -3.0 }).collect();
        let summary = Bootstrap {
            resamples: 2000,
            confidence_level: 0.95,
            seed: 3,
        }
        .run(&values);
        let expected = 9.0 / 400.0;
        assert!((summary.variance - expected).abs() < 0.2 * expected);
        assert!(summary.ci_low < 0.0 && summary.ci_high > 0.0);
    }
}
