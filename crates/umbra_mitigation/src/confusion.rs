//! Confusion matrices and their inversion.
//!
//! `C[measured][prepared]` is the probability of reading `measured` after
//! preparing `prepared`, over the calibrated qubit subset. Each prepared column
//! sums to one. Indices follow `Snapshot::outcome_index`: calibrated qubit `j`
//! is bit `j`.

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use umbra_core::{ShadowError, ShadowResult};

/// Tolerance for column sums when accepting a prebuilt matrix
const STOCHASTIC_TOLERANCE: f64 = 1e-9;

/// Thresholds deciding between exact inversion and the pseudo-inverse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InversionConfig {
    /// Condition numbers above this use the pseudo-inverse
    pub max_condition_number: f64,
    /// Determinants with magnitude at or below this use the pseudo-inverse
    pub determinant_epsilon: f64,
    /// Singular values at or below this are dropped by the pseudo-inverse
    pub pseudo_inverse_epsilon: f64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            max_condition_number: 1e6,
            determinant_epsilon: 1e-12,
            pseudo_inverse_epsilon: 1e-12,
        }
    }
}

impl InversionConfig {
    /// Set the condition number threshold
    #[must_use]
    pub fn with_max_condition_number(mut self, max: f64) -> Self {
        self.max_condition_number = max;
        self
    }

    /// Validate thresholds
    ///
    /// # Errors
    ///
    /// Returns error if any threshold is negative or NaN
    pub fn validate(&self) -> ShadowResult<()> {
        if self.max_condition_number.is_nan() || self.max_condition_number < 1.0 {
            return Err(ShadowError::config(
                "max_condition_number",
                "must be at least 1",
            ));
        }
        let negative = |v: f64| v.is_nan() || v < 0.0;
        if negative(self.determinant_epsilon) || negative(self.pseudo_inverse_epsilon) {
            return Err(ShadowError::config("epsilon", "must be non-negative"));
        }
        Ok(())
    }
}

/// How the inverse was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InversionMethod {
    /// Ordinary matrix inverse
    Exact,
    /// Moore-Penrose pseudo-inverse after a near-singular check
    PseudoInverse,
}

/// Outcome of inverting a confusion matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InversionReport {
    /// Method used
    pub method: InversionMethod,
    /// Ratio of largest to smallest singular value (infinite if singular)
    pub condition_number: f64,
    /// Determinant of the raw matrix
    pub determinant: f64,
}

impl InversionReport {
    /// Whether the pseudo-inverse fallback was taken
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.method == InversionMethod::PseudoInverse
    }
}

/// Calibrated confusion matrix with its cached inverse
///
/// Never mutated after construction; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    qubits: Vec<usize>,
    shots_per_state: u32,
    matrix: Vec<f64>,
    inverse: Vec<f64>,
    report: InversionReport,
    timestamp: DateTime<Utc>,
}

impl ConfusionMatrix {
    /// Build from raw calibration histograms
    ///
    /// `counts[prepared][measured]` is how often `measured` was read after
    /// preparing `prepared`. Every prepared row must total `shots_per_state`.
    ///
    /// # Errors
    ///
    /// Returns error on shape mismatch, duplicate qubits, or wrong totals
    pub fn from_counts(
        qubits: Vec<usize>,
        shots_per_state: u32,
        counts: &[Vec<u64>],
        timestamp: DateTime<Utc>,
        config: &InversionConfig,
    ) -> ShadowResult<Self> {
        let dim = Self::validate_qubits(&qubits)?;
        if shots_per_state == 0 {
            return Err(ShadowError::config("shots_per_state", "must be positive"));
        }
        if counts.len() != dim {
            return Err(ShadowError::config(
                "counts",
                format!("expected {} prepared states, got {}", dim, counts.len()),
            ));
        }

        let shots = f64::from(shots_per_state);
        let mut matrix = vec![0.0; dim * dim];
        for (prepared, row) in counts.iter().enumerate() {
            if row.len() != dim {
                return Err(ShadowError::config(
                    "counts",
                    format!(
                        "prepared state {} has {} outcome bins, expected {}",
                        prepared,
                        row.len(),
                        dim
                    ),
                ));
            }
            let total: u64 = row.iter().sum();
            if total != u64::from(shots_per_state) {
                return Err(ShadowError::config(
                    "counts",
                    format!(
                        "prepared state {} has {} shots, expected {}",
                        prepared, total, shots_per_state
                    ),
                ));
            }
            for (measured, &count) in row.iter().enumerate() {
                matrix[measured * dim + prepared] = count as f64 / shots;
            }
        }

        Self::from_parts(qubits, shots_per_state, matrix, timestamp, config)
    }

    /// Build from a dense row-major matrix `C[measured][prepared]`
    ///
    /// # Errors
    ///
    /// Returns error if the matrix is not square of side `2^k` or columns are
    /// not probability distributions
    pub fn from_matrix(
        qubits: Vec<usize>,
        shots_per_state: u32,
        matrix: Vec<f64>,
        timestamp: DateTime<Utc>,
        config: &InversionConfig,
    ) -> ShadowResult<Self> {
        let dim = Self::validate_qubits(&qubits)?;
        if matrix.len() != dim * dim {
            return Err(ShadowError::config(
                "matrix",
                format!("expected {} entries, got {}", dim * dim, matrix.len()),
            ));
        }
        if matrix.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(ShadowError::config(
                "matrix",
                "entries must be probabilities in [0, 1]",
            ));
        }
        for prepared in 0..dim {
            let column: f64 = (0..dim).map(|m| matrix[m * dim + prepared]).sum();
            if (column - 1.0).abs() > STOCHASTIC_TOLERANCE {
                return Err(ShadowError::config(
                    "matrix",
                    format!("column {} sums to {}, expected 1", prepared, column),
                ));
            }
        }
        Self::from_parts(qubits, shots_per_state, matrix, timestamp, config)
    }

    /// Ideal readout on `qubits`
    ///
    /// # Errors
    ///
    /// Returns error if `qubits` is empty or has duplicates
    pub fn identity(qubits: Vec<usize>, timestamp: DateTime<Utc>) -> ShadowResult<Self> {
        let dim = Self::validate_qubits(&qubits)?;
        let mut matrix = vec![0.0; dim * dim];
        for i in 0..dim {
            matrix[i * dim + i] = 1.0;
        }
        Self::from_parts(qubits, 1, matrix, timestamp, &InversionConfig::default())
    }

    /// Reassemble from an archive without re-inverting
    ///
    /// The inverse stored next to the matrix is reused verbatim so replays see
    /// exactly the numbers the original run used.
    pub(crate) fn from_archive_parts(
        qubits: Vec<usize>,
        shots_per_state: u32,
        matrix: Vec<f64>,
        inverse: Vec<f64>,
        report: InversionReport,
        timestamp: DateTime<Utc>,
    ) -> ShadowResult<Self> {
        let dim = Self::validate_qubits(&qubits)?;
        if matrix.len() != dim * dim || inverse.len() != dim * dim {
            return Err(ShadowError::config(
                "matrix",
                format!("archive holds a matrix of the wrong size for {} qubits", qubits.len()),
            ));
        }
        Ok(Self {
            qubits,
            shots_per_state,
            matrix,
            inverse,
            report,
            timestamp,
        })
    }

    fn from_parts(
        qubits: Vec<usize>,
        shots_per_state: u32,
        matrix: Vec<f64>,
        timestamp: DateTime<Utc>,
        config: &InversionConfig,
    ) -> ShadowResult<Self> {
        config.validate()?;
        let dim = 1usize << qubits.len();
        let (inverse, report) = invert(&matrix, dim, config)?;
        Ok(Self {
            qubits,
            shots_per_state,
            matrix,
            inverse,
            report,
            timestamp,
        })
    }

    /// Check a calibration qubit set and return the matrix dimension
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty set, a duplicate qubit, or
    /// more than 12 qubits
    pub fn validate_qubits(qubits: &[usize]) -> ShadowResult<usize> {
        if qubits.is_empty() {
            return Err(ShadowError::config("qubits_calibrated", "must not be empty"));
        }
        // Dense matrices are 4^k entries; past 12 qubits this is not a sane request.
        if qubits.len() > 12 {
            return Err(ShadowError::config(
                "qubits_calibrated",
                format!("{} qubits exceeds the dense calibration limit of 12", qubits.len()),
            ));
        }
        for (i, q) in qubits.iter().enumerate() {
            if qubits[..i].contains(q) {
                return Err(ShadowError::config(
                    "qubits_calibrated",
                    format!("qubit {} listed twice", q),
                ));
            }
        }
        Ok(1usize << qubits.len())
    }

    /// Calibrated qubits; position `j` is bit `j` of a matrix index
    #[must_use]
    pub fn qubits(&self) -> &[usize] {
        &self.qubits
    }

    /// Side length `2^k`
    #[must_use]
    pub fn dimension(&self) -> usize {
        1usize << self.qubits.len()
    }

    /// Calibration shots per prepared basis state
    #[must_use]
    pub const fn shots_per_state(&self) -> u32 {
        self.shots_per_state
    }

    /// When calibration finished
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Row-major `C[measured][prepared]`
    #[must_use]
    pub fn matrix(&self) -> &[f64] {
        &self.matrix
    }

    /// Row-major inverse (or pseudo-inverse)
    #[must_use]
    pub fn inverse(&self) -> &[f64] {
        &self.inverse
    }

    /// Entry `C[measured][prepared]`
    #[must_use]
    pub fn get(&self, measured: usize, prepared: usize) -> f64 {
        self.matrix[measured * self.dimension() + prepared]
    }

    /// How the inverse was obtained
    #[must_use]
    pub const fn report(&self) -> &InversionReport {
        &self.report
    }

    /// Whether the pseudo-inverse fallback was used
    #[must_use]
    pub fn pseudo_inverse_used(&self) -> bool {
        self.report.degraded()
    }

    /// Mean probability of reading back the prepared state
    #[must_use]
    pub fn assignment_fidelity(&self) -> f64 {
        let dim = self.dimension();
        (0..dim).map(|i| self.get(i, i)).sum::<f64>() / dim as f64
    }

    /// Age of the calibration at `reference`
    #[must_use]
    pub fn age_at(&self, reference: DateTime<Utc>) -> chrono::Duration {
        reference.signed_duration_since(self.timestamp)
    }

    /// Whether the calibration is older than `bound` at `reference`
    #[must_use]
    pub fn is_stale_at(&self, reference: DateTime<Utc>, bound: chrono::Duration) -> bool {
        self.age_at(reference) > bound
    }

    /// Column `observed` of the inverse: the unclipped quasi-distribution over
    /// true outcomes implied by a single observed outcome
    #[must_use]
    pub fn quasi_distribution(&self, observed: usize) -> Vec<f64> {
        let dim = self.dimension();
        (0..dim).map(|row| self.inverse[row * dim + observed]).collect()
    }

    /// Correct an observed outcome histogram
    ///
    /// Returns `C⁻¹ · p` for the normalized histogram `p`, with negative
    /// entries clipped to zero and the result renormalized. The clipping is a
    /// lossy correction, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the histogram has the wrong length or no mass
    pub fn correct_counts(&self, counts: &[f64]) -> ShadowResult<Vec<f64>> {
        let dim = self.dimension();
        if counts.len() != dim {
            return Err(ShadowError::config(
                "counts",
                format!("expected {} bins, got {}", dim, counts.len()),
            ));
        }
        if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(ShadowError::config("counts", "bins must be finite and non-negative"));
        }
        let total: f64 = counts.iter().sum();
        if total <= 0.0 {
            return Err(ShadowError::config("counts", "histogram is empty"));
        }
        let observed: Vec<f64> = counts.iter().map(|c| c / total).collect();

        let mut corrected: Vec<f64> = (0..dim)
            .map(|row| {
                let start = row * dim;
                self.inverse[start..start + dim]
                    .iter()
                    .zip(&observed)
                    .map(|(a, p)| a * p)
                    .sum::<f64>()
                    .max(0.0)
            })
            .collect();

        let mass: f64 = corrected.iter().sum();
        if mass <= 0.0 {
            debug!("correction clipped every bin; returning the observed distribution");
            return Ok(observed);
        }
        for value in &mut corrected {
            *value /= mass;
        }
        Ok(corrected)
    }
}

/// Invert a row-major square matrix, falling back to the pseudo-inverse
fn invert(
    matrix: &[f64],
    dim: usize,
    config: &InversionConfig,
) -> ShadowResult<(Vec<f64>, InversionReport)> {
    let m = DMatrix::from_row_slice(dim, dim, matrix);
    let singular = m.singular_values();
    let largest = singular.max();
    let smallest = singular.min();
    let condition_number = if smallest > 0.0 {
        largest / smallest
    } else {
        f64::INFINITY
    };
    let determinant = m.determinant();

    let well_conditioned = condition_number <= config.max_condition_number
        && determinant.abs() > config.determinant_epsilon;
    let exact = if well_conditioned {
        m.clone().try_inverse()
    } else {
        None
    };

    let (inverse, method) = match exact {
        Some(inverse) => (inverse, InversionMethod::Exact),
        None => {
            warn!(
                condition_number,
                determinant, "confusion matrix is near-singular; using pseudo-inverse"
            );
            let pinv = m
                .pseudo_inverse(config.pseudo_inverse_epsilon)
                .map_err(|e| ShadowError::config("pseudo_inverse_epsilon", e))?;
            (pinv, InversionMethod::PseudoInverse)
        }
    };

    let mut row_major = Vec::with_capacity(dim * dim);
    for row in 0..dim {
        for col in 0..dim {
            row_major.push(inverse[(row, col)]);
        }
    }

    Ok((
        row_major,
        InversionReport {
            method,
            condition_number,
            determinant,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn noisy_single_qubit(p01: f64, p10: f64) -> ConfusionMatrix {
        // C[m][p]: column 0 = prepared |0>, column 1 = prepared |1>
        ConfusionMatrix::from_matrix(
            vec![0],
            1000,
            vec![1.0 - p01, p10, p01, 1.0 - p10],
            ts(),
            &InversionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_counts_layout() {
        let counts = vec![vec![90, 10], vec![20, 80]];
        let cm = ConfusionMatrix::from_counts(
            vec![3],
            100,
            &counts,
            ts(),
            &InversionConfig::default(),
        )
        .unwrap();
        assert_eq!(cm.dimension(), 2);
        assert!((cm.get(0, 0) - 0.9).abs() < 1e-12);
        assert!((cm.get(1, 0) - 0.1).abs() < 1e-12);
        assert!((cm.get(0, 1) - 0.2).abs() < 1e-12);
        assert!((cm.get(1, 1) - 0.8).abs() < 1e-12);
        assert!(!cm.pseudo_inverse_used());
        assert!((cm.assignment_fidelity() - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_from_counts_rejects_bad_totals() {
        let counts = vec![vec![90, 9], vec![20, 80]];
        let result =
            ConfusionMatrix::from_counts(vec![0], 100, &counts, ts(), &InversionConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_qubits_rejected() {
        assert!(ConfusionMatrix::identity(vec![1, 1], ts()).is_err());
        assert!(ConfusionMatrix::identity(vec![], ts()).is_err());
    }

    #[test]
    fn test_identity_inverse_is_identity() {
        let cm = ConfusionMatrix::identity(vec![0, 1], ts()).unwrap();
        for r in 0..4 {
            for c in 0..4 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((cm.inverse()[r * 4 + c] - expected).abs() < 1e-12);
            }
        }
        assert!(!cm.pseudo_inverse_used());
    }

    #[test]
    fn test_identity_correction_is_noop() {
        let cm = ConfusionMatrix::identity(vec![0, 1], ts()).unwrap();
        let counts = [10.0, 20.0, 30.0, 40.0];
        let corrected = cm.correct_counts(&counts).unwrap();
        for (c, raw) in corrected.iter().zip(counts) {
            assert!((c - raw / 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_correction_recovers_true_distribution() {
        let cm = noisy_single_qubit(0.05, 0.1);
        // True distribution (0.7, 0.3) pushed through C
        let true_p = [0.7, 0.3];
        let observed = [
            cm.get(0, 0) * true_p[0] + cm.get(0, 1) * true_p[1],
            cm.get(1, 0) * true_p[0] + cm.get(1, 1) * true_p[1],
        ];
        let corrected = cm.correct_counts(&observed).unwrap();
        assert!((corrected[0] - 0.7).abs() < 1e-9);
        assert!((corrected[1] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_correction_clips_negative_entries() {
        let cm = noisy_single_qubit(0.1, 0.1);
        // Observing only |0> is "better than perfect" under this matrix
        let corrected = cm.correct_counts(&[100.0, 0.0]).unwrap();
        assert!(corrected.iter().all(|p| *p >= 0.0));
        assert!((corrected.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(corrected[1], 0.0);
    }

    #[test]
    fn test_correction_rejects_bad_input() {
        let cm = noisy_single_qubit(0.1, 0.1);
        assert!(cm.correct_counts(&[1.0]).is_err());
        assert!(cm.correct_counts(&[0.0, 0.0]).is_err());
        assert!(cm.correct_counts(&[-1.0, 2.0]).is_err());
    }

    #[test]
    fn test_singular_matrix_uses_pseudo_inverse() {
        // Readout ignores the prepared state entirely
        let cm = ConfusionMatrix::from_matrix(
            vec![0],
            100,
            vec![0.5, 0.5, 0.5, 0.5],
            ts(),
            &InversionConfig::default(),
        )
        .unwrap();
        assert!(cm.pseudo_inverse_used());
        assert!(cm.report().condition_number.is_infinite() || cm.report().condition_number > 1e6);
        assert!(cm.inverse().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_condition_threshold_forces_pseudo_inverse() {
        let config = InversionConfig::default().with_max_condition_number(1.5);
        let cm = ConfusionMatrix::from_matrix(
            vec![0],
            100,
            vec![0.8, 0.3, 0.2, 0.7],
            ts(),
            &config,
        )
        .unwrap();
        assert!(cm.pseudo_inverse_used());

        // Invertible matrix: pseudo-inverse equals the inverse
        let exact = noisy_single_qubit(0.2, 0.3);
        for (a, b) in cm.inverse().iter().zip(exact.inverse()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_from_matrix_rejects_non_stochastic() {
        let result = ConfusionMatrix::from_matrix(
            vec![0],
            100,
            vec![0.9, 0.9, 0.1, 0.2],
            ts(),
            &InversionConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_quasi_distribution_is_inverse_column() {
        let cm = noisy_single_qubit(0.05, 0.1);
        let q = cm.quasi_distribution(1);
        assert_eq!(q, vec![cm.inverse()[1], cm.inverse()[3]]);
        // Columns of C^-1 sum to one because columns of C do
        assert!((q.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_staleness() {
        let cm = ConfusionMatrix::identity(vec![0], ts()).unwrap();
        let bound = chrono::Duration::hours(24);
        assert!(!cm.is_stale_at(ts() + chrono::Duration::hours(23), bound));
        assert!(cm.is_stale_at(ts() + chrono::Duration::hours(25), bound));
    }

    #[test]
    fn test_invalid_inversion_config() {
        let config = InversionConfig {
            max_condition_number: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_corrected_is_distribution(
            p01 in 0.0f64..0.3,
            p10 in 0.0f64..0.3,
            c0 in 0.0f64..1000.0,
            c1 in 0.0f64..1000.0,
        ) {
            prop_assume!(c0 + c1 > 1.0);
            let cm = noisy_single_qubit(p01, p10);
            let corrected = cm.correct_counts(&[c0, c1]).unwrap();
            prop_assert!(corrected.iter().all(|p| *p >= 0.0));
            prop_assert!((corrected.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
