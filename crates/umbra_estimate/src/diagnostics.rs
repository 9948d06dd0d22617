//! Recoverable conditions reported alongside estimates.

use serde::{Deserialize, Serialize};
use umbra_core::SnapshotBatch;

/// 0.999 quantile of the chi-square distribution with two degrees of freedom
pub const CHI_SQUARE_THRESHOLD: f64 = 13.815_510_557_964_274;

/// Smallest window worth testing for basis balance
const MIN_BALANCE_SAMPLES: usize = 30;

/// Default acquisition-order window for basis-balance checks
pub const DEFAULT_BALANCE_WINDOW: usize = 1000;

/// Degradation recorded on a result; never an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No snapshots were available
    EmptySnapshotPool,
    /// No snapshot measured the observable's support in matching bases
    InsufficientSupport {
        /// Observable key
        observable: String,
    },
    /// The confusion matrix was inverted through the pseudo-inverse
    DegradedInversion {
        /// Condition number of the raw matrix
        #[serde(with = "umbra_core::float")]
        condition_number: f64,
    },
    /// The calibration is older than its validity window
    StaleCalibration {
        /// Calibration age
        age_hours: f64,
        /// Configured bound
        bound_hours: f64,
    },
    /// Basis choices on a qubit drift away from uniform
    BasisImbalance {
        /// Qubit index
        qubit: usize,
        /// Largest windowed chi-square statistic
        chi_square: f64,
    },
}

/// Basis frequencies of one qubit over one acquisition-order window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasisBalance {
    /// Qubit index
    pub qubit: usize,
    /// Index of the first snapshot in the window
    pub window_start: usize,
    /// Snapshots in the window
    pub samples: usize,
    /// Counts of X, Y, Z
    pub counts: [usize; 3],
    /// Pearson statistic against a uniform basis choice
    pub chi_square: f64,
}

impl BasisBalance {
    /// Whether the statistic exceeds [`CHI_SQUARE_THRESHOLD`]
    #[must_use]
    pub fn is_imbalanced(&self) -> bool {
        self.chi_square > CHI_SQUARE_THRESHOLD
    }
}

/// Per-qubit basis balance over consecutive windows of `window` snapshots
///
/// Windows shorter than 30 snapshots are skipped. Order of the result is
/// window-major, then qubit.
#[must_use]
pub fn basis_balance(batch: &SnapshotBatch, window: usize) -> Vec<BasisBalance> {
    let window = window.max(MIN_BALANCE_SAMPLES);
    let mut out = Vec::new();
    for (chunk_index, chunk) in batch.as_slice().chunks(window).enumerate() {
        if chunk.len() < MIN_BALANCE_SAMPLES {
            continue;
        }
        let expected = chunk.len() as f64 / 3.0;
        for qubit in 0..batch.num_qubits() {
            let mut counts = [0usize; 3];
            for snapshot in chunk {
                counts[snapshot.basis()[qubit].index()] += 1;
            }
            let chi_square = counts
                .iter()
                .map(|&c| (c as f64 - expected).powi(2) / expected)
                .sum();
            out.push(BasisBalance {
                qubit,
                window_start: chunk_index * window,
                samples: chunk.len(),
                counts,
                chi_square,
            });
        }
    }
    out
}

/// Worst window per imbalanced qubit, as diagnostics
pub(crate) fn imbalance_diagnostics(batch: &SnapshotBatch) -> Vec<Diagnostic> {
    let mut worst: Vec<Option<f64>> = vec![None; batch.num_qubits()];
    for balance in basis_balance(batch, DEFAULT_BALANCE_WINDOW) {
        if balance.is_imbalanced() {
            let slot = &mut worst[balance.qubit];
            if slot.is_none_or(|w| balance.chi_square > w) {
                *slot = Some(balance.chi_square);
            }
        }
    }
    worst
        .into_iter()
        .enumerate()
        .filter_map(|(qubit, chi)| chi.map(|chi_square| Diagnostic::BasisImbalance { qubit, chi_square }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::Snapshot;

    fn batch_from_bases(bases: &[&str]) -> SnapshotBatch {
        let snapshots = bases
            .iter()
            .map(|b| Snapshot::parse(b, &"0".repeat(b.len())).unwrap())
            .collect();
        SnapshotBatch::from_snapshots(snapshots).unwrap()
    }

    #[test]
    fn test_uniform_bases_are_balanced() {
        let bases: Vec<&str> = ["XZ", "YY", "ZX"].iter().copied().cycle().take(300).collect();
        let balance = basis_balance(&batch_from_bases(&bases), 99);
        assert_eq!(balance.len(), 6);
        assert!(balance.iter().all(|b| b.chi_square == 0.0));
        assert!(imbalance_diagnostics(&batch_from_bases(&bases)).is_empty());
    }

    #[test]
    fn test_stuck_basis_is_flagged() {
        let bases: Vec<&str> = ["XZ", "YZ", "ZZ"].iter().copied().cycle().take(300).collect();
        let batch = batch_from_bases(&bases);
        let diagnostics = imbalance_diagnostics(&batch);
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::BasisImbalance { qubit, chi_square } => {
                assert_eq!(*qubit, 1);
                assert!((chi_square - 600.0).abs() < 1e-9);
            }
            other => panic!("unexpected diagnostic {:?}", other),
        }
    }

    #[test]
    fn test_short_tail_window_skipped() {
        let bases: Vec<&str> = ["X", "Y", "Z"].iter().copied().cycle().take(110).collect();
        let balance = basis_balance(&batch_from_bases(&bases), 100);
        assert_eq!(balance.len(), 1);
        assert_eq!(balance[0].samples, 100);
    }

    #[test]
    fn test_diagnostic_json_tags() {
        let json = serde_json::to_string(&Diagnostic::EmptySnapshotPool).unwrap();
        assert_eq!(json, r#"{"kind":"empty_snapshot_pool"}"#);

        let degraded = Diagnostic::DegradedInversion {
            condition_number: f64::INFINITY,
        };
        let json = serde_json::to_string(&degraded).unwrap();
        assert!(json.contains("null"));
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Diagnostic::DegradedInversion { condition_number } if condition_number.is_nan()));
    }
}
