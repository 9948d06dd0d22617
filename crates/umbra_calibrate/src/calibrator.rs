//! Calibration state machine.
//!
//! `Uncalibrated → Calibrating → Calibrated → Invalid`. Only a run that
//! finished every basis-state round reaches `Calibrated`; an aborted or failed
//! run leaves the calibrator `Invalid` with no matrix.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use umbra_core::{ShadowError, ShadowResult};
use umbra_mitigation::ConfusionMatrix;

use crate::backend::CalibrationBackend;
use crate::config::CalibrationConfig;

/// Lifecycle of a calibrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationState {
    /// No calibration has run
    Uncalibrated,
    /// Basis-state rounds in progress
    Calibrating {
        /// Rounds finished
        completed: usize,
        /// Rounds requested
        total: usize,
    },
    /// A confusion matrix is available
    Calibrated,
    /// The last calibration is unusable
    Invalid {
        /// Why
        reason: String,
    },
}

impl CalibrationState {
    /// Whether a confusion matrix may be used
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated)
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncalibrated => write!(f, "UNCALIBRATED"),
            Self::Calibrating { completed, total } => {
                write!(f, "CALIBRATING ({}/{})", completed, total)
            }
            Self::Calibrated => write!(f, "CALIBRATED"),
            Self::Invalid { reason } => write!(f, "INVALID ({})", reason),
        }
    }
}

/// Builds confusion matrices from basis-state preparations
#[derive(Debug)]
pub struct Calibrator {
    config: CalibrationConfig,
    state: CalibrationState,
    matrix: Option<Arc<ConfusionMatrix>>,
}

impl Calibrator {
    /// Create an uncalibrated calibrator
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: CalibrationConfig) -> ShadowResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: CalibrationState::Uncalibrated,
            matrix: None,
        })
    }

    /// Use a previously calibrated matrix
    #[must_use]
    pub fn from_matrix(config: CalibrationConfig, matrix: Arc<ConfusionMatrix>) -> Self {
        Self {
            config,
            state: CalibrationState::Calibrated,
            matrix: Some(matrix),
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// The calibrated matrix
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::NotCalibrated`] unless the state is `Calibrated`
    pub fn confusion_matrix(&self) -> ShadowResult<Arc<ConfusionMatrix>> {
        match (&self.state, &self.matrix) {
            (CalibrationState::Calibrated, Some(matrix)) => Ok(Arc::clone(matrix)),
            _ => Err(ShadowError::NotCalibrated {
                state: self.state.to_string(),
            }),
        }
    }

    /// Invalidate the current matrix after backend drift
    pub fn mark_drift(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "calibration invalidated");
        self.matrix = None;
        self.state = CalibrationState::Invalid { reason };
    }

    /// Calibrate `qubits` to completion
    ///
    /// # Errors
    ///
    /// See [`Calibrator::calibrate_with_cancel`]
    pub fn calibrate<B>(&mut self, backend: &mut B, qubits: &[usize]) -> ShadowResult<Arc<ConfusionMatrix>>
    where
        B: CalibrationBackend + ?Sized,
    {
        self.calibrate_with_cancel(backend, qubits, &CancellationToken::new())
    }

    /// Calibrate `qubits`, checking `cancel` before every basis-state round
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::CalibrationCancelled`] if cancelled,
    /// [`ShadowError::Backend`] if the backend fails or returns malformed
    /// outcomes, or a configuration error for an invalid qubit set. The
    /// calibrator is left `Invalid` in every failure case after rounds began.
    pub fn calibrate_with_cancel<B>(
        &mut self,
        backend: &mut B,
        qubits: &[usize],
        cancel: &CancellationToken,
    ) -> ShadowResult<Arc<ConfusionMatrix>>
    where
        B: CalibrationBackend + ?Sized,
    {
        let total = ConfusionMatrix::validate_qubits(qubits)?;
        let shots = self.config.shots_per_state;
        self.matrix = None;
        self.state = CalibrationState::Calibrating {
            completed: 0,
            total,
        };
        info!(qubits = ?qubits, shots_per_state = shots, rounds = total, "calibration started");

        let mut counts = Vec::with_capacity(total);
        for prepared in 0..total {
            if cancel.is_cancelled() {
                return Err(self.fail(ShadowError::CalibrationCancelled {
                    completed: prepared,
                    total,
                }));
            }

            let outcomes = backend
                .prepare_and_measure(qubits, prepared, shots)
                .map_err(ShadowError::Backend)
                .map_err(|e| self.fail(e))?;
            let histogram = histogram(&outcomes, total, shots).map_err(|e| self.fail(e))?;
            counts.push(histogram);

            self.state = CalibrationState::Calibrating {
                completed: prepared + 1,
                total,
            };
            debug!(prepared, completed = prepared + 1, total, "calibration round done");
        }

        let matrix = ConfusionMatrix::from_counts(
            qubits.to_vec(),
            shots,
            &counts,
            Utc::now(),
            &self.config.inversion,
        )
        .map_err(|e| self.fail(e))?;
        let matrix = Arc::new(matrix);

        info!(
            fidelity = matrix.assignment_fidelity(),
            degraded = matrix.pseudo_inverse_used(),
            "calibration finished"
        );
        self.matrix = Some(Arc::clone(&matrix));
        self.state = CalibrationState::Calibrated;
        Ok(matrix)
    }

    fn fail(&mut self, error: ShadowError) -> ShadowError {
        warn!(%error, "calibration failed");
        self.matrix = None;
        self.state = CalibrationState::Invalid {
            reason: error.to_string(),
        };
        error
    }
}

fn histogram(outcomes: &[usize], dim: usize, shots: u32) -> ShadowResult<Vec<u64>> {
    if outcomes.len() != shots as usize {
        return Err(ShadowError::Backend(format!(
            "backend returned {} outcomes for {} shots",
            outcomes.len(),
            shots
        )));
    }
    let mut histogram = vec![0u64; dim];
    for &outcome in outcomes {
        let slot = histogram.get_mut(outcome).ok_or_else(|| {
            ShadowError::Backend(format!(
                "backend returned outcome {} outside {} basis states",
                outcome, dim
            ))
        })?;
        *slot += 1;
    }
    Ok(histogram)
}

/// Calibrate `qubits` once with `shots_per_state` shots per basis state
///
/// # Errors
///
/// See [`Calibrator::calibrate_with_cancel`]
pub fn calibrate<B>(backend: &mut B, qubits: &[usize], shots_per_state: u32) -> ShadowResult<Arc<ConfusionMatrix>>
where
    B: CalibrationBackend + ?Sized,
{
    let config = CalibrationConfig::default().with_shots_per_state(shots_per_state);
    Calibrator::new(config)?.calibrate(backend, qubits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect(_: &[usize], prepared: usize, shots: u32) -> Result<Vec<usize>, String> {
        Ok(vec![prepared; shots as usize])
    }

    #[test]
    fn test_perfect_backend_gives_identity() {
        let matrix = calibrate(&mut perfect, &[0, 2], 64).unwrap();
        assert_eq!(matrix.dimension(), 4);
        for m in 0..4 {
            for p in 0..4 {
                let expected = if m == p { 1.0 } else { 0.0 };
                assert_eq!(matrix.get(m, p), expected);
            }
        }
        assert_eq!(matrix.qubits(), &[0, 2]);
        assert_eq!(matrix.shots_per_state(), 64);
    }

    #[test]
    fn test_state_transitions() {
        let mut calibrator = Calibrator::new(CalibrationConfig::default()).unwrap();
        assert_eq!(calibrator.state(), &CalibrationState::Uncalibrated);
        assert!(matches!(
            calibrator.confusion_matrix(),
            Err(ShadowError::NotCalibrated { .. })
        ));

        calibrator.calibrate(&mut perfect, &[1]).unwrap();
        assert!(calibrator.state().is_calibrated());
        assert!(calibrator.confusion_matrix().is_ok());

        calibrator.mark_drift("T1 dropped");
        assert!(matches!(calibrator.state(), CalibrationState::Invalid { .. }));
        assert!(calibrator.confusion_matrix().is_err());
    }

    #[test]
    fn test_cancel_between_rounds_leaves_invalid() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut rounds = 0;
        let mut backend = |_: &[usize], prepared: usize, shots: u32| {
            rounds += 1;
            if rounds == 2 {
                trigger.cancel();
            }
            Ok::<_, String>(vec![prepared; shots as usize])
        };

        let mut calibrator = Calibrator::new(CalibrationConfig::default()).unwrap();
        let err = calibrator
            .calibrate_with_cancel(&mut backend, &[0, 1], &cancel)
            .unwrap_err();
        assert_eq!(
            err,
            ShadowError::CalibrationCancelled {
                completed: 2,
                total: 4
            }
        );
        assert!(!calibrator.state().is_calibrated());
        assert!(calibrator.confusion_matrix().is_err());
    }

    #[test]
    fn test_backend_failure_invalidates() {
        let mut calibrator = Calibrator::new(CalibrationConfig::default()).unwrap();
        calibrator.calibrate(&mut perfect, &[0]).unwrap();

        let mut failing = |_: &[usize], _: usize, _: u32| Err::<Vec<usize>, String>("queue closed".to_string());
        let err = calibrator.calibrate(&mut failing, &[0]).unwrap_err();
        assert_eq!(err, ShadowError::Backend("queue closed".to_string()));
        assert!(matches!(calibrator.state(), CalibrationState::Invalid { .. }));
        assert!(calibrator.confusion_matrix().is_err());
    }

    #[test]
    fn test_malformed_outcomes_rejected() {
        let mut short = |_: &[usize], _: usize, _: u32| Ok::<_, String>(vec![0usize; 3]);
        assert!(matches!(
            calibrate(&mut short, &[0], 16),
            Err(ShadowError::Backend(_))
        ));

        let mut out_of_range = |_: &[usize], _: usize, shots: u32| Ok::<_, String>(vec![7usize; shots as usize]);
        assert!(matches!(
            calibrate(&mut out_of_range, &[0], 16),
            Err(ShadowError::Backend(_))
        ));
    }

    #[test]
    fn test_invalid_qubit_sets() {
        assert!(calibrate(&mut perfect, &[], 16).is_err());
        assert!(calibrate(&mut perfect, &[3, 3], 16).is_err());
        assert!(calibrate(&mut perfect, &[0], 0).is_err());
    }

    #[test]
    fn test_duplicate_qubits_rejected_before_any_round() {
        let mut calls = 0;
        let mut backend = |_: &[usize], prepared: usize, shots: u32| {
            calls += 1;
            Ok::<_, String>(vec![prepared; shots as usize])
        };
        let mut calibrator = Calibrator::new(CalibrationConfig::default()).unwrap();
        let err = calibrator.calibrate(&mut backend, &[3, 3]).unwrap_err();
        assert!(matches!(err, ShadowError::ConfigMismatch { .. }));
        assert_eq!(calls, 0);
        assert_eq!(calibrator.state(), &CalibrationState::Uncalibrated);
    }

    #[test]
    fn test_prior_matrix_is_calibrated() {
        let matrix = calibrate(&mut perfect, &[0], 8).unwrap();
        let calibrator = Calibrator::from_matrix(CalibrationConfig::default(), matrix);
        assert!(calibrator.state().is_calibrated());
        assert!(calibrator.confusion_matrix().is_ok());
    }

    #[test]
    fn test_state_display() {
        let state = CalibrationState::Calibrating {
            completed: 1,
            total: 4,
        };
        assert_eq!(state.to_string(), "CALIBRATING (1/4)");
    }
}
