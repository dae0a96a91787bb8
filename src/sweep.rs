//! Sweep controller
//!
//! Drives one parameter sweep, strictly one run at a time:
//!
//! ```text
//! Idle ─> Configuring ─> Running ─> Recording ─┬─> Idle (next value)
//!                                              ├─> Recovering ─> Idle
//!                                              └─> Done (finalize)
//! ```
//!
//! Values that already have a record are skipped unless a rerun is forced,
//! so restarting after a crash only runs what is missing. A configuration
//! reset is the only recovery action; if it fails the sweep aborts.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::editor::{ConfigEditor, ParameterTarget};
use crate::experiment::{ResultStore, RunRecord};
use crate::supervisor::{RunOutcome, RunSupervisor, Runner};
use crate::{Error, Result};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Waiting for the next pending value.
    Idle,
    /// Writing the value into the external configuration.
    Configuring(u32),
    /// External program running for the value.
    Running(u32),
    /// Persisting the run's record.
    Recording(u32),
    /// Resetting the external configuration.
    Recovering,
    /// No pending values remain.
    Done,
}

/// Which parameter values to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    candidates: Vec<u32>,
    force_rerun: bool,
    clear_results: bool,
}

impl SweepPlan {
    /// Every value in `min..=max`.
    #[must_use]
    pub fn range(min: u32, max: u32) -> Self {
        Self::specific(min..=max)
    }

    /// Exactly the given values.
    #[must_use]
    pub fn specific(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            candidates: values.into_iter().collect(),
            force_rerun: false,
            clear_results: false,
        }
    }

    /// Plan covering the configured range.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::range(config.min_parameter, config.max_parameter)
    }

    /// Run values even when they already have a record.
    #[must_use]
    pub const fn force_rerun(mut self, force: bool) -> Self {
        self.force_rerun = force;
        self
    }

    /// Empty the result store before running.
    #[must_use]
    pub const fn clear_results(mut self, clear: bool) -> Self {
        self.clear_results = clear;
        self
    }

    /// Candidate values as given.
    #[must_use]
    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }

    fn validate(&self) -> Result<()> {
        if self.candidates.contains(&0) {
            return Err(Error::InvalidParameter(0));
        }
        Ok(())
    }
}

/// Counters for one `run` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Values selected for this call.
    pub planned: usize,
    /// External program launches.
    pub launched: usize,
    /// Runs recorded as success.
    pub succeeded: usize,
    /// Runs recorded as failed.
    pub failed: usize,
    /// Runs recorded as unknown.
    pub unknown: usize,
    /// Configuration resets performed.
    pub recoveries: usize,
    /// Values whose configuration edit did not apply.
    pub config_misses: usize,
}

/// Drives a sweep against a [`ParameterTarget`] and a [`Runner`].
#[derive(Debug)]
pub struct SweepController<T, R> {
    target: T,
    runner: R,
    store: ResultStore,
    timeout: Duration,
    failure_threshold: u32,
    state: SweepState,
}

impl SweepController<ConfigEditor, RunSupervisor> {
    /// File- and process-backed controller from harness settings. Loads (or
    /// initializes) the result store.
    ///
    /// # Errors
    ///
    /// Returns error if the settings are invalid or the store cannot be loaded.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        config.validate()?;
        let store = ResultStore::load(&config.results_path)?;
        Ok(Self::new(
            ConfigEditor::new(&config.config_path),
            RunSupervisor::from_config(config),
            store,
        )
        .with_timeout(config.timeout())
        .with_failure_threshold(config.failure_threshold))
    }
}

impl<T: ParameterTarget, R: Runner> SweepController<T, R> {
    /// Controller with default timeout and failure threshold.
    #[must_use]
    pub fn new(target: T, runner: R, store: ResultStore) -> Self {
        let defaults = HarnessConfig::default();
        Self {
            target,
            runner,
            store,
            timeout: defaults.timeout(),
            failure_threshold: defaults.failure_threshold,
            state: SweepState::Idle,
        }
    }

    /// Set the per-run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many consecutive non-successes trigger a reset.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SweepState {
        self.state
    }

    /// Result store.
    #[must_use]
    pub const fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Parameter target.
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Consume the controller, returning its store.
    #[must_use]
    pub fn into_store(self) -> ResultStore {
        self.store
    }

    fn enter(&mut self, next: SweepState) {
        debug!(from = ?self.state, to = ?next, "sweep transition");
        self.state = next;
    }

    /// Execute the plan.
    ///
    /// # Errors
    ///
    /// Returns error if a plan value is zero, a persisted artifact cannot be
    /// written, or a configuration reset fails. Records persisted before the
    /// failure are kept.
    pub async fn run(&mut self, plan: &SweepPlan) -> Result<SweepSummary> {
        plan.validate()?;
        if plan.clear_results {
            self.store.clear()?;
        }

        let pending = if plan.force_rerun {
            let mut all = plan.candidates.clone();
            all.sort_unstable();
            all.dedup();
            all
        } else {
            self.store.pending(plan.candidates.iter().copied())
        };

        let mut summary = SweepSummary {
            planned: pending.len(),
            ..SweepSummary::default()
        };
        if pending.is_empty() {
            info!("all requested parameter values have been tested");
        } else {
            info!(count = pending.len(), values = ?pending, "testing parameter values");
        }

        let mut consecutive_failures = 0u32;
        for value in pending {
            self.enter(SweepState::Configuring(value));
            info!(value, "starting run");
            match self.target.set_parameter(value) {
                Ok(()) => {}
                Err(e @ Error::Persist { .. }) => return self.abort(e),
                Err(e) => {
                    warn!(value, error = %e, "configuration edit did not apply; running anyway");
                    summary.config_misses += 1;
                }
            }

            self.enter(SweepState::Running(value));
            summary.launched += 1;
            let outcome = match self.runner.execute(self.timeout).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(value, error = %e, "run could not be supervised");
                    RunOutcome::Crashed { exit_code: None }
                }
            };

            self.enter(SweepState::Recording(value));
            let record = RunRecord::new(value, outcome.to_outcome());
            if let Err(e) = self.store.upsert(record) {
                return self.abort(e);
            }

            let corrupted = matches!(outcome, RunOutcome::ConfigCorrupted);
            match outcome {
                RunOutcome::Completed { .. } | RunOutcome::AssumedBudget { .. } => {
                    summary.succeeded += 1;
                    consecutive_failures = 0;
                }
                RunOutcome::Unknown => summary.unknown += 1,
                RunOutcome::TimedOut
                | RunOutcome::Crashed { .. }
                | RunOutcome::ConfigCorrupted => {
                    summary.failed += 1;
                    consecutive_failures += 1;
                }
            }
            info!(value, outcome = %outcome.to_outcome(), "run recorded");

            if corrupted || consecutive_failures >= self.failure_threshold {
                self.enter(SweepState::Recovering);
                warn!(
                    consecutive_failures,
                    corrupted, "resetting external configuration"
                );
                if let Err(e) = self.target.reset_to_defaults() {
                    return self.abort(e);
                }
                summary.recoveries += 1;
                consecutive_failures = 0;
            }
            self.enter(SweepState::Idle);
        }

        self.store.finalize()?;
        self.enter(SweepState::Done);
        info!(
            launched = summary.launched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            recoveries = summary.recoveries,
            "sweep complete"
        );
        Ok(summary)
    }

    fn abort(&mut self, cause: Error) -> Result<SweepSummary> {
        error!(error = %cause, "unrecoverable failure, aborting sweep");
        if let Err(e) = self.store.finalize() {
            error!(error = %e, "could not finalize results while aborting");
        }
        self.enter(SweepState::Done);
        Err(cause)
    }
}
