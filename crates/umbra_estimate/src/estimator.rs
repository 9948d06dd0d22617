//! Multi-observable estimation over a shared snapshot pool.

use chrono::Utc;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use umbra_core::{Observable, ShadowResult, SnapshotBatch};
use umbra_mitigation::{MitigationConfig, Staleness};

use crate::bootstrap::{Bootstrap, BootstrapSummary};
use crate::config::{ShadowConfig, SubsampleMode};
use crate::diagnostics::{Diagnostic, imbalance_diagnostics};
use crate::reconstruct::{ObservablePlan, Reconstructor};
use crate::result::{EstimateSet, EstimateStatus, ObservableEstimate};

/// Estimator bound to one configuration and mitigation context
#[derive(Debug, Clone)]
pub struct ShadowEstimator {
    config: ShadowConfig,
    reconstructor: Reconstructor,
    staleness: Option<Staleness>,
}

impl ShadowEstimator {
    /// Create an estimator
    ///
    /// Staleness is judged against the mitigation reference time, or the
    /// current time when none is set.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the protocol version
    /// and mitigation disagree
    pub fn new(config: ShadowConfig, mitigation: Option<&MitigationConfig>) -> ShadowResult<Self> {
        config.validate()?;
        let reconstructor = Reconstructor::new(config.version, mitigation)?;
        let staleness = mitigation
            .filter(|m| m.is_active())
            .and_then(|m| m.staleness(Utc::now()));
        Ok(Self {
            config,
            reconstructor,
            staleness,
        })
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Reconstruction rule
    #[must_use]
    pub const fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    /// Staleness of the confusion matrix, if mitigation is active
    #[must_use]
    pub const fn staleness(&self) -> Option<Staleness> {
        self.staleness
    }

    fn bootstrap(&self) -> Bootstrap {
        Bootstrap {
            resamples: self.config.bootstrap_resamples,
            confidence_level: self.config.confidence_level,
            seed: self.config.bootstrap_seed,
        }
    }

    /// Estimate every observable from the same pool
    ///
    /// Observables are validated before any evaluation. Each one is evaluated
    /// independently of the others, so its estimate does not depend on which
    /// observables share the call. Duplicate observables collapse to one entry.
    ///
    /// # Errors
    ///
    /// Returns error if an observable width differs from the pool width or
    /// calibrated qubits fall outside the circuit
    pub fn estimate(
        &self,
        batch: &SnapshotBatch,
        observables: &[Observable],
    ) -> ShadowResult<EstimateSet> {
        let num_qubits = batch.num_qubits();
        self.reconstructor.check_width(num_qubits)?;
        let plans = observables
            .iter()
            .map(|o| self.reconstructor.plan(o, num_qubits))
            .collect::<ShadowResult<Vec<ObservablePlan>>>()?;

        let pool = match self.config.subsample {
            SubsampleMode::Full => batch.clone(),
            SubsampleMode::OrderedPrefix(n) => batch.prefix(n),
        };
        info!(
            observables = plans.len(),
            snapshots = pool.len(),
            version = %self.config.version,
            "estimating observables"
        );

        let bootstrap = self.bootstrap();
        let estimates: Vec<ObservableEstimate> = plans
            .par_iter()
            .map(|plan| self.estimate_one(plan, &pool, &bootstrap))
            .collect();

        let mut diagnostics = Vec::new();
        if pool.is_empty() {
            warn!("snapshot pool is empty; every estimate is undefined");
            diagnostics.push(Diagnostic::EmptySnapshotPool);
        }
        if let Some(matrix) = self.reconstructor.matrix() {
            if matrix.pseudo_inverse_used() {
                diagnostics.push(Diagnostic::DegradedInversion {
                    condition_number: matrix.report().condition_number,
                });
            }
        }
        if let Some(staleness) = self.staleness.filter(Staleness::is_stale) {
            diagnostics.push(Diagnostic::StaleCalibration {
                age_hours: staleness.age_hours,
                bound_hours: staleness.bound_hours,
            });
        }
        diagnostics.extend(imbalance_diagnostics(&pool));

        let mut by_key = IndexMap::with_capacity(estimates.len());
        for estimate in estimates {
            if estimate.status == EstimateStatus::InsufficientData {
                diagnostics.push(Diagnostic::InsufficientSupport {
                    observable: estimate.observable.key(),
                });
            }
            by_key.entry(estimate.observable.key()).or_insert(estimate);
        }

        Ok(EstimateSet {
            version: self.config.version,
            num_snapshots: pool.len(),
            confidence_level: self.config.confidence_level,
            bootstrap_resamples: self.config.bootstrap_resamples,
            bootstrap_seed: self.config.bootstrap_seed,
            estimates: by_key,
            diagnostics,
        })
    }

    fn estimate_one(
        &self,
        plan: &ObservablePlan,
        pool: &SnapshotBatch,
        bootstrap: &Bootstrap,
    ) -> ObservableEstimate {
        let observable = plan.observable().clone();
        let n = pool.len();
        if n == 0 {
            return ObservableEstimate {
                observable,
                expectation_value: f64::NAN,
                variance: f64::NAN,
                std_error: f64::NAN,
                ci_low: f64::NAN,
                ci_high: f64::NAN,
                compatible_snapshots: 0,
                status: EstimateStatus::EmptyPool,
            };
        }

        let compatible = pool.iter().filter(|s| plan.is_compatible(s)).count();
        if compatible == 0 {
            debug!(observable = %observable, "no compatible snapshots");
            return ObservableEstimate {
                observable,
                expectation_value: 0.0,
                variance: f64::NAN,
                std_error: f64::NAN,
                ci_low: f64::NAN,
                ci_high: f64::NAN,
                compatible_snapshots: 0,
                status: EstimateStatus::InsufficientData,
            };
        }

        let contributions = self.reconstructor.contributions(plan, pool.as_slice());
        let mean = contributions.iter().sum::<f64>() / n as f64;
        let BootstrapSummary {
            variance,
            ci_low,
            ci_high,
        } = bootstrap.run(&contributions);

        ObservableEstimate {
            observable,
            expectation_value: mean,
            variance,
            std_error: variance.sqrt(),
            ci_low,
            ci_high,
            compatible_snapshots: compatible,
            status: EstimateStatus::Ok,
        }
    }
}

/// Estimate `observables` from `batch` in one pass
///
/// Estimates are pure with respect to the snapshots, the observables, and the
/// seeds in `config`: identical inputs give bit-identical values. The
/// [`Diagnostic::StaleCalibration`] entry reads the clock unless the mitigation
/// config carries a `reference_time`; pin it for fully reproducible output.
///
/// # Errors
///
/// See [`ShadowEstimator::new`] and [`ShadowEstimator::estimate`]
pub fn estimate(
    batch: &SnapshotBatch,
    observables: &[Observable],
    config: &ShadowConfig,
    mitigation: Option<&MitigationConfig>,
) -> ShadowResult<EstimateSet> {
    ShadowEstimator::new(config.clone(), mitigation)?.estimate(batch, observables)
}
