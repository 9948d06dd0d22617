//! Randomized single-shot measurements and the arena that holds them.
//!
//! Outcome bit convention: character `i` of an outcome string is the bit of
//! qubit `i`. Integer outcome indices over a qubit subset put the subset's
//! first qubit at bit 0.

use std::sync::Arc;

use crate::error::{ShadowError, ShadowResult};
use crate::pauli::MeasurementBasis;

/// One randomized measurement: a basis per qubit and the observed bits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot {
    basis: Vec<MeasurementBasis>,
    outcome: Vec<u8>,
}

impl Snapshot {
    /// Create a snapshot
    ///
    /// # Errors
    ///
    /// Returns error if lengths differ, are zero, or any bit is not 0/1
    pub fn new(basis: Vec<MeasurementBasis>, outcome: Vec<u8>) -> ShadowResult<Self> {
        if basis.is_empty() {
            return Err(ShadowError::InvalidSnapshot {
                reason: "snapshot has no qubits".to_string(),
            });
        }
        if basis.len() != outcome.len() {
            return Err(ShadowError::InvalidSnapshot {
                reason: format!(
                    "basis has {} qubits but outcome has {} bits",
                    basis.len(),
                    outcome.len()
                ),
            });
        }
        if let Some(bad) = outcome.iter().find(|b| **b > 1) {
            return Err(ShadowError::InvalidSnapshot {
                reason: format!("outcome bit {} is not 0 or 1", bad),
            });
        }
        Ok(Self { basis, outcome })
    }

    /// Parse from basis and outcome strings, e.g. `("XZY", "010")`
    ///
    /// # Errors
    ///
    /// Returns error on unknown basis characters or non-binary outcomes
    pub fn parse(basis: &str, outcome: &str) -> ShadowResult<Self> {
        let basis = basis
            .chars()
            .map(MeasurementBasis::from_char)
            .collect::<ShadowResult<Vec<_>>>()?;
        let outcome = outcome
            .chars()
            .map(|c| match c {
                '0' => Ok(0u8),
                '1' => Ok(1u8),
                other => Err(ShadowError::InvalidSnapshot {
                    reason: format!("outcome character '{}' is not a bit", other),
                }),
            })
            .collect::<ShadowResult<Vec<_>>>()?;
        Self::new(basis, outcome)
    }

    /// Number of qubits
    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.basis.len()
    }

    /// Basis per qubit
    #[must_use]
    pub fn basis(&self) -> &[MeasurementBasis] {
        &self.basis
    }

    /// Outcome bits per qubit
    #[must_use]
    pub fn outcome(&self) -> &[u8] {
        &self.outcome
    }

    /// Basis as a string, e.g. `"XZY"`
    #[must_use]
    pub fn basis_string(&self) -> String {
        self.basis.iter().map(MeasurementBasis::as_char).collect()
    }

    /// Outcome as a bitstring, e.g. `"010"`
    #[must_use]
    pub fn outcome_string(&self) -> String {
        self.outcome
            .iter()
            .map(|b| if *b == 0 { '0' } else { '1' })
            .collect()
    }

    /// Integer index of the outcome restricted to `qubits`
    ///
    /// `qubits[j]` contributes bit `j` of the result.
    ///
    /// # Errors
    ///
    /// Returns error if a qubit is out of range or listed twice, or if there
    /// are too many qubits to pack into a `usize`
    pub fn outcome_index(&self, qubits: &[usize]) -> ShadowResult<usize> {
        check_index_qubits(qubits, self.outcome.len(), usize::BITS as usize - 1)?;
        Ok(self.packed_index(qubits))
    }

    fn packed_index(&self, qubits: &[usize]) -> usize {
        qubits
            .iter()
            .enumerate()
            .fold(0usize, |acc, (j, &q)| acc | (usize::from(self.outcome[q]) << j))
    }
}

/// Widest qubit set a dense outcome histogram is built for
pub const MAX_HISTOGRAM_QUBITS: usize = 24;

fn check_index_qubits(qubits: &[usize], num_qubits: usize, max: usize) -> ShadowResult<()> {
    if qubits.len() > max {
        return Err(ShadowError::config(
            "qubits",
            format!("{} qubits exceeds the limit of {}", qubits.len(), max),
        ));
    }
    for (i, &q) in qubits.iter().enumerate() {
        if q >= num_qubits {
            return Err(ShadowError::config(
                "qubits",
                format!("qubit {} out of range for {} qubits", q, num_qubits),
            ));
        }
        if qubits[..i].contains(&q) {
            return Err(ShadowError::config("qubits", format!("qubit {} listed twice", q)));
        }
    }
    Ok(())
}

/// Immutable, ordered arena of snapshots on a fixed number of qubits
///
/// Cloning is cheap; every observable set evaluated against a batch reads the
/// same storage. Order is acquisition order and is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBatch {
    num_qubits: usize,
    snapshots: Arc<[Snapshot]>,
}

impl SnapshotBatch {
    /// Create a batch, validating every snapshot width
    ///
    /// # Errors
    ///
    /// Returns error if `num_qubits` is zero or any snapshot has another width
    pub fn new(num_qubits: usize, snapshots: Vec<Snapshot>) -> ShadowResult<Self> {
        if num_qubits == 0 {
            return Err(ShadowError::config("num_qubits", "must be at least 1"));
        }
        for (index, snapshot) in snapshots.iter().enumerate() {
            if snapshot.num_qubits() != num_qubits {
                return Err(ShadowError::QubitCountMismatch {
                    context: format!("snapshot {}", index),
                    expected: num_qubits,
                    actual: snapshot.num_qubits(),
                });
            }
        }
        Ok(Self {
            num_qubits,
            snapshots: snapshots.into(),
        })
    }

    /// Create from a non-empty vector, inferring width from the first snapshot
    ///
    /// # Errors
    ///
    /// Returns error if empty or widths disagree
    pub fn from_snapshots(snapshots: Vec<Snapshot>) -> ShadowResult<Self> {
        let num_qubits = snapshots
            .first()
            .map(Snapshot::num_qubits)
            .ok_or_else(|| ShadowError::InvalidSnapshot {
                reason: "cannot infer qubit count from an empty batch".to_string(),
            })?;
        Self::new(num_qubits, snapshots)
    }

    /// Number of qubits
    #[must_use]
    pub const fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of snapshots
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshots in acquisition order
    #[must_use]
    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Iterate in acquisition order
    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    /// First `n` snapshots in acquisition order (all of them if `n >= len`)
    #[must_use]
    pub fn prefix(&self, n: usize) -> Self {
        if n >= self.len() {
            return self.clone();
        }
        Self {
            num_qubits: self.num_qubits,
            snapshots: self.snapshots[..n].into(),
        }
    }

    /// Outcome histogram over `qubits`, indexed as in [`Snapshot::outcome_index`]
    ///
    /// # Errors
    ///
    /// Returns error if any qubit index is out of range or repeated, or if
    /// more than [`MAX_HISTOGRAM_QUBITS`] are requested
    pub fn outcome_counts(&self, qubits: &[usize]) -> ShadowResult<Vec<u64>> {
        check_index_qubits(qubits, self.num_qubits, MAX_HISTOGRAM_QUBITS)?;
        let mut counts = vec![0u64; 1usize << qubits.len()];
        for snapshot in self.iter() {
            counts[snapshot.packed_index(qubits)] += 1;
        }
        Ok(counts)
    }
}

impl<'a> IntoIterator for &'a SnapshotBatch {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_parse() {
        let s = Snapshot::parse("XZY", "010").unwrap();
        assert_eq!(s.num_qubits(), 3);
        assert_eq!(
            s.basis(),
            &[MeasurementBasis::X, MeasurementBasis::Z, MeasurementBasis::Y]
        );
        assert_eq!(s.outcome(), &[0, 1, 0]);
        assert_eq!(s.basis_string(), "XZY");
        assert_eq!(s.outcome_string(), "010");
    }

    #[test]
    fn test_snapshot_rejects_mismatched_lengths() {
        assert!(Snapshot::parse("XZ", "010").is_err());
        assert!(Snapshot::parse("", "").is_err());
        assert!(Snapshot::parse("XI", "01").is_err());
        assert!(Snapshot::parse("XZ", "02").is_err());
        assert!(Snapshot::new(vec![MeasurementBasis::Z], vec![2]).is_err());
    }

    #[test]
    fn test_outcome_index_little_endian() {
        let s = Snapshot::parse("ZZZ", "110").unwrap();
        assert_eq!(s.outcome_index(&[0, 1, 2]).unwrap(), 0b011);
        assert_eq!(s.outcome_index(&[2, 1]).unwrap(), 0b10);
        assert_eq!(s.outcome_index(&[]).unwrap(), 0);
    }

    #[test]
    fn test_outcome_index_rejects_bad_qubits() {
        let s = Snapshot::parse("ZZZ", "110").unwrap();
        assert!(s.outcome_index(&[3]).is_err());
        assert!(s.outcome_index(&[1, 1]).is_err());
        assert!(s.outcome_index(&[0; 64]).is_err());
    }

    #[test]
    fn test_batch_width_validation() {
        let a = Snapshot::parse("ZZ", "00").unwrap();
        let b = Snapshot::parse("ZZZ", "000").unwrap();
        let err = SnapshotBatch::new(2, vec![a.clone(), b]).unwrap_err();
        assert!(matches!(err, ShadowError::QubitCountMismatch { .. }));

        assert!(SnapshotBatch::new(0, vec![]).is_err());
        assert!(SnapshotBatch::from_snapshots(vec![]).is_err());

        let batch = SnapshotBatch::from_snapshots(vec![a]).unwrap();
        assert_eq!(batch.num_qubits(), 2);
    }

    #[test]
    fn test_batch_prefix_preserves_order() {
        let snaps: Vec<Snapshot> = ["00", "01", "10", "11"]
            .iter()
            .map(|o| Snapshot::parse("ZZ", o).unwrap())
            .collect();
        let batch = SnapshotBatch::new(2, snaps.clone()).unwrap();

        let head = batch.prefix(2);
        assert_eq!(head.len(), 2);
        assert_eq!(head.as_slice(), &snaps[..2]);
        assert_eq!(batch.prefix(10).len(), 4);
    }

    #[test]
    fn test_outcome_counts() {
        let snaps: Vec<Snapshot> = ["00", "10", "10", "11"]
            .iter()
            .map(|o| Snapshot::parse("ZZ", o).unwrap())
            .collect();
        let batch = SnapshotBatch::new(2, snaps).unwrap();
        assert_eq!(batch.outcome_counts(&[0, 1]).unwrap(), vec![1, 2, 0, 1]);
        assert_eq!(batch.outcome_counts(&[1]).unwrap(), vec![3, 1]);
        assert!(batch.outcome_counts(&[5]).is_err());
        assert!(batch.outcome_counts(&[0, 0]).is_err());
    }
}
