//! Post-sweep analysis
//!
//! Reads finished run records and reports three empirical operating points
//! plus a fitted performance model:
//!
//! | Metric         | Minimizes            |
//! |----------------|----------------------|
//! | fastest        | `steps`              |
//! | most efficient | `steps / n`          |
//! | best balanced  | `steps · sqrt(n)`    |
//!
//! The empirical metrics never depend on the fit, so they are reported even
//! when fitting is skipped. The recommendation is the best-balanced value.

mod fit;

pub use fit::{fit_model, ModelFit, MIN_FIT_POINTS};

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::experiment::{RunRecord, RunStatus};
use crate::{Error, Result};

/// Points sampled along the fitted curve for external plotting.
pub const DEFAULT_CURVE_SAMPLES: usize = 100;

/// One successful measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Sweep parameter value.
    pub parameter: u32,
    /// Measured steps.
    pub steps: u64,
}

impl Observation {
    #[allow(clippy::cast_precision_loss)]
    fn steps_f64(self) -> f64 {
        self.steps as f64
    }

    /// `steps / n`
    #[must_use]
    pub fn efficiency(self) -> f64 {
        self.steps_f64() / f64::from(self.parameter)
    }

    /// `steps · sqrt(n)`
    #[must_use]
    pub fn balance(self) -> f64 {
        self.steps_f64() * f64::from(self.parameter).sqrt()
    }
}

/// Model-based optimum inside the tested range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TheoreticalOptimum {
    /// `sqrt(a/c)`
    pub parameter: f64,
    /// Model prediction at that parameter.
    pub predicted_steps: f64,
}

/// Fitted model with its in-range optimum, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Coefficients and goodness of fit.
    pub fit: ModelFit,
    /// Optimum, reported only when it falls inside the tested range.
    pub optimum: Option<TheoreticalOptimum>,
}

/// Sample of the fitted curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    /// Parameter value.
    pub parameter: f64,
    /// Predicted steps.
    pub steps: f64,
}

/// Full analysis output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Distinct parameter values with any record.
    pub tested: usize,
    /// Successful measurements, ascending by parameter.
    pub observations: Vec<Observation>,
    /// Parameters whose run failed (timeouts, crashes, corruption).
    pub failed_parameters: Vec<u32>,
    /// Parameters with unknown outcome.
    pub unknown_parameters: Vec<u32>,
    /// Minimum steps.
    pub fastest: Observation,
    /// Minimum steps per unit of parameter.
    pub most_efficient: Observation,
    /// Minimum `steps · sqrt(n)`.
    pub best_balanced: Observation,
    /// Smallest tested successful parameter.
    pub baseline: Observation,
    /// Step reduction of `fastest` relative to `baseline`, in percent.
    pub speedup_percent: f64,
    /// Fitted model, absent when fitting was skipped.
    pub model: Option<ModelSummary>,
    /// Fitted curve over the tested range, empty without a model.
    pub curve: Vec<CurvePoint>,
    /// Recommended parameter value.
    pub recommendation: u32,
}

/// Computes an [`AnalysisReport`] from run records.
#[derive(Debug, Clone)]
pub struct Analyzer {
    curve_samples: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            curve_samples: DEFAULT_CURVE_SAMPLES,
        }
    }
}

impl Analyzer {
    /// Analyzer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many curve points to sample.
    #[must_use]
    pub const fn with_curve_samples(mut self, samples: usize) -> Self {
        self.curve_samples = samples;
        self
    }

    /// Analyze `records`. Duplicate parameters keep the most recent record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] when no run succeeded. Fit
    /// failures are logged and leave [`AnalysisReport::model`] empty.
    pub fn analyze(&self, records: &[RunRecord]) -> Result<AnalysisReport> {
        let latest = latest_by_parameter(records);

        let mut observations = Vec::new();
        let mut failed_parameters = Vec::new();
        let mut unknown_parameters = Vec::new();
        for record in latest.values() {
            match (record.status(), record.steps()) {
                (RunStatus::Success, Some(steps)) => observations.push(Observation {
                    parameter: record.parameter(),
                    steps,
                }),
                (RunStatus::Unknown, _) => unknown_parameters.push(record.parameter()),
                _ => failed_parameters.push(record.parameter()),
            }
        }

        let (Some(&baseline), Some(&last)) = (observations.first(), observations.last()) else {
            return Err(Error::InsufficientData {
                required: 1,
                found: 0,
            });
        };

        let fastest = argmin(&observations, |o| o.steps_f64());
        let most_efficient = argmin(&observations, Observation::efficiency);
        let best_balanced = argmin(&observations, Observation::balance);

        let speedup_percent = if baseline.steps == 0 {
            0.0
        } else {
            (baseline.steps_f64() - fastest.steps_f64()) / baseline.steps_f64() * 100.0
        };

        let range = (f64::from(baseline.parameter), f64::from(last.parameter));
        let model = fit_summary(&observations, range);
        let curve = model
            .as_ref()
            .map(|m| sample_curve(&m.fit, range, self.curve_samples))
            .unwrap_or_default();

        info!(
            fastest = fastest.parameter,
            most_efficient = most_efficient.parameter,
            best_balanced = best_balanced.parameter,
            "analysis complete"
        );

        Ok(AnalysisReport {
            tested: latest.len(),
            observations,
            failed_parameters,
            unknown_parameters,
            fastest,
            most_efficient,
            best_balanced,
            baseline,
            speedup_percent,
            model,
            curve,
            recommendation: best_balanced.parameter,
        })
    }
}

/// Most recent record per parameter, keyed ascending. Ties on timestamp go
/// to the later record in input order.
fn latest_by_parameter(records: &[RunRecord]) -> BTreeMap<u32, &RunRecord> {
    let mut latest: BTreeMap<u32, &RunRecord> = BTreeMap::new();
    for record in records {
        latest
            .entry(record.parameter())
            .and_modify(|held| {
                if record.observed_at() >= held.observed_at() {
                    *held = record;
                }
            })
            .or_insert(record);
    }
    latest
}

/// First observation minimizing `key` (observations are ascending, so ties
/// go to the smaller parameter).
fn argmin(observations: &[Observation], key: impl Fn(Observation) -> f64) -> Observation {
    let mut best = observations[0];
    let mut best_key = key(best);
    for &candidate in &observations[1..] {
        let k = key(candidate);
        if k < best_key {
            best = candidate;
            best_key = k;
        }
    }
    best
}

fn fit_summary(observations: &[Observation], (lo, hi): (f64, f64)) -> Option<ModelSummary> {
    let points: Vec<(f64, f64)> = observations
        .iter()
        .map(|o| (f64::from(o.parameter), o.steps_f64()))
        .collect();

    let fit = match fit_model(&points) {
        Ok(fit) => fit,
        Err(e) => {
            warn!(error = %e, "skipping model fit");
            return None;
        }
    };
    debug!(a = fit.a, b = fit.b, c = fit.c, r_squared = fit.r_squared, "model fitted");

    let optimum = fit.minimizer().and_then(|n| {
        if (lo..=hi).contains(&n) {
            Some(TheoreticalOptimum {
                parameter: n,
                predicted_steps: fit.predict(n),
            })
        } else {
            debug!(optimum = n, lo, hi, "theoretical optimum outside tested range");
            None
        }
    });
    Some(ModelSummary { fit, optimum })
}

#[allow(clippy::cast_precision_loss)]
fn sample_curve(fit: &ModelFit, (lo, hi): (f64, f64), samples: usize) -> Vec<CurvePoint> {
    match samples {
        0 => Vec::new(),
        1 => vec![CurvePoint {
            parameter: lo,
            steps: fit.predict(lo),
        }],
        _ => {
            let step = (hi - lo) / (samples - 1) as f64;
            (0..samples)
                .map(|i| {
                    let n = lo + step * i as f64;
                    CurvePoint {
                        parameter: n,
                        steps: fit.predict(n),
                    }
                })
                .collect()
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sweep Results Analysis ===")?;
        writeln!(f, "Configurations tested: {}", self.tested)?;
        writeln!(f, "Successful runs: {}", self.observations.len())?;
        writeln!(
            f,
            "Parameter range: {} to {}",
            self.baseline.parameter,
            self.observations.last().map_or(self.baseline.parameter, |o| o.parameter)
        )?;
        writeln!(f)?;
        writeln!(f, "Optimal configurations:")?;
        writeln!(f, "1. Fastest: {} ({} steps)", self.fastest.parameter, self.fastest.steps)?;
        writeln!(
            f,
            "2. Most efficient: {} ({} steps, {:.2} steps per unit)",
            self.most_efficient.parameter,
            self.most_efficient.steps,
            self.most_efficient.efficiency()
        )?;
        writeln!(
            f,
            "3. Best balance: {} ({} steps)",
            self.best_balanced.parameter, self.best_balanced.steps
        )?;
        writeln!(
            f,
            "\nSpeedup of {} vs. {}: {:.1}%",
            self.fastest.parameter, self.baseline.parameter, self.speedup_percent
        )?;

        match &self.model {
            Some(model) => {
                let m = model.fit;
                writeln!(f, "\nModel analysis:")?;
                writeln!(
                    f,
                    "Fitted model: steps = {:.1}/n + {:.1} + {:.3}*n (R² = {:.3})",
                    m.a, m.b, m.c, m.r_squared
                )?;
                if let Some(opt) = model.optimum {
                    writeln!(f, "Theoretical optimum: {:.1}", opt.parameter)?;
                    writeln!(f, "Predicted steps at optimum: {:.1}", opt.predicted_steps)?;
                }
            }
            None => writeln!(f, "\nNo predictive model could be fitted")?,
        }

        if !self.failed_parameters.is_empty() {
            writeln!(f, "\nFailed configurations: {:?}", self.failed_parameters)?;
        }
        if !self.unknown_parameters.is_empty() {
            writeln!(f, "Unknown outcomes: {:?}", self.unknown_parameters)?;
        }
        write!(f, "\nRecommendation: {}", self.recommendation)
    }
}
