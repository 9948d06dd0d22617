//! Single-snapshot shadow reconstruction.
//!
//! The local shadow `3 U† |o⟩⟨o| U − I` is never materialized. A Pauli factor
//! measured in its own basis evaluates to `3·(−1)^o`; a factor measured in any
//! other basis makes the whole snapshot contribute exactly zero.

use std::sync::Arc;

use umbra_core::{
    MeasurementBasis, Observable, ShadowError, ShadowResult, ShadowVersion, Snapshot,
};
use umbra_mitigation::{ConfusionMatrix, MitigationConfig};

/// Eigenvalue factor of a matched Pauli measurement
#[inline]
fn signed_three(bit: u8) -> f64 {
    if bit == 0 { 3.0 } else { -3.0 }
}

/// Contribution of one snapshot to one observable under the v0 protocol
#[must_use]
pub fn snapshot_contribution(snapshot: &Snapshot, observable: &Observable) -> f64 {
    let mut value = 1.0;
    for (qubit, symbol) in observable.pauli_string.symbols().iter().enumerate() {
        let Some(required) = symbol.basis() else {
            continue;
        };
        if snapshot.basis()[qubit] != required {
            return 0.0;
        }
        value *= signed_three(snapshot.outcome()[qubit]);
    }
    observable.coefficient * value
}

/// One non-identity factor of a planned observable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Factor {
    qubit: usize,
    basis: MeasurementBasis,
    /// Bit position in the confusion-matrix index, if the qubit is calibrated
    calibrated_bit: Option<usize>,
}

/// An observable prepared for repeated evaluation against snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct ObservablePlan {
    observable: Observable,
    factors: Vec<Factor>,
    /// `weights[j]` = product of `3·(−1)^bit` over calibrated factors for index `j`
    calibrated_weights: Option<Vec<f64>>,
}

impl ObservablePlan {
    /// The observable
    #[must_use]
    pub const fn observable(&self) -> &Observable {
        &self.observable
    }

    /// Whether the snapshot measured every support qubit in the right basis
    #[must_use]
    pub fn is_compatible(&self, snapshot: &Snapshot) -> bool {
        let basis = snapshot.basis();
        self.factors.iter().all(|f| basis[f.qubit] == f.basis)
    }
}

/// Per-version reconstruction rule
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstructor {
    /// Random local Pauli-basis shadows
    V0,
    /// v0 with each snapshot's calibrated outcome replaced by its
    /// inverse-confusion quasi-distribution
    V1 {
        /// Calibrated confusion matrix
        matrix: Arc<ConfusionMatrix>,
    },
}

impl Reconstructor {
    /// Select the rule for `version`
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::MitigationRequired`] if v1 has no active
    /// mitigation, or if v0 is given active mitigation it would ignore
    pub fn new(version: ShadowVersion, mitigation: Option<&MitigationConfig>) -> ShadowResult<Self> {
        let active = mitigation.filter(|m| m.is_active());
        match version {
            ShadowVersion::V0 => {
                if active.is_some() {
                    return Err(ShadowError::MitigationRequired {
                        reason: "v0 shadows ignore readout correction; use v1 with MEM".to_string(),
                    });
                }
                Ok(Self::V0)
            }
            ShadowVersion::V1 => {
                let mitigation = active.ok_or_else(|| ShadowError::MitigationRequired {
                    reason: "v1 shadows require MEM mitigation".to_string(),
                })?;
                mitigation.validate()?;
                let matrix = mitigation
                    .matrix()
                    .cloned()
                    .ok_or_else(|| ShadowError::MitigationRequired {
                        reason: "v1 shadows require a confusion matrix".to_string(),
                    })?;
                Ok(Self::V1 { matrix })
            }
        }
    }

    /// Protocol version
    #[must_use]
    pub const fn version(&self) -> ShadowVersion {
        match self {
            Self::V0 => ShadowVersion::V0,
            Self::V1 { .. } => ShadowVersion::V1,
        }
    }

    /// Confusion matrix in use, if any
    #[must_use]
    pub fn matrix(&self) -> Option<&Arc<ConfusionMatrix>> {
        match self {
            Self::V0 => None,
            Self::V1 { matrix } => Some(matrix),
        }
    }

    /// Check the rule applies to circuits of `num_qubits`
    ///
    /// # Errors
    ///
    /// Returns error if a calibrated qubit lies outside the circuit
    pub fn check_width(&self, num_qubits: usize) -> ShadowResult<()> {
        if let Some(matrix) = self.matrix() {
            if let Some(&q) = matrix.qubits().iter().find(|&&q| q >= num_qubits) {
                return Err(ShadowError::config(
                    "qubits_calibrated",
                    format!("calibrated qubit {} outside a {}-qubit circuit", q, num_qubits),
                ));
            }
        }
        Ok(())
    }

    /// Prepare an observable for evaluation
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::QubitCountMismatch`] if widths differ
    pub fn plan(&self, observable: &Observable, num_qubits: usize) -> ShadowResult<ObservablePlan> {
        observable.check_width(num_qubits)?;
        let calibrated = self.matrix().map(|m| m.qubits());

        let factors: Vec<Factor> = observable
            .pauli_string
            .symbols()
            .iter()
            .enumerate()
            .filter_map(|(qubit, symbol)| {
                symbol.basis().map(|basis| Factor {
                    qubit,
                    basis,
                    calibrated_bit: calibrated
                        .and_then(|qs| qs.iter().position(|&q| q == qubit)),
                })
            })
            .collect();

        let calibrated_weights = self.matrix().and_then(|matrix| {
            let bits: Vec<usize> = factors.iter().filter_map(|f| f.calibrated_bit).collect();
            if bits.is_empty() {
                return None;
            }
            let weights = (0..matrix.dimension())
                .map(|j| {
                    bits.iter()
                        .map(|&b| signed_three(((j >> b) & 1) as u8))
                        .product()
                })
                .collect();
            Some(weights)
        });

        Ok(ObservablePlan {
            observable: observable.clone(),
            factors,
            calibrated_weights,
        })
    }

    /// Single-snapshot contribution of a planned observable
    #[must_use]
    pub fn contribution(&self, plan: &ObservablePlan, snapshot: &Snapshot) -> f64 {
        if !plan.is_compatible(snapshot) {
            return 0.0;
        }
        let outcome = snapshot.outcome();
        let mut value = 1.0;
        for factor in &plan.factors {
            if factor.calibrated_bit.is_none() || plan.calibrated_weights.is_none() {
                value *= signed_three(outcome[factor.qubit]);
            }
        }
        if let (Self::V1 { matrix }, Some(weights)) = (self, &plan.calibrated_weights) {
            // Calibrated qubits are distinct and inside the circuit once planned
            let observed = matrix
                .qubits()
                .iter()
                .enumerate()
                .fold(0usize, |acc, (j, &q)| acc | (usize::from(outcome[q]) << j));
            let dim = matrix.dimension();
            let inverse = matrix.inverse();
            let corrected: f64 = weights
                .iter()
                .enumerate()
                .map(|(j, w)| inverse[j * dim + observed] * w)
                .sum();
            value *= corrected;
        }
        plan.observable.coefficient * value
    }

    /// Contributions of every snapshot, in order
    #[must_use]
    pub fn contributions(&self, plan: &ObservablePlan, snapshots: &[Snapshot]) -> Vec<f64> {
        snapshots
            .iter()
            .map(|snapshot| self.contribution(plan, snapshot))
            .collect()
    }
}
