//! Harness configuration
//!
//! All paths, ranges, and timing knobs live in one [`HarnessConfig`] value
//! passed to the controller at construction. It can be loaded from a TOML
//! file and overridden field by field from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What to record when the external program exits cleanly without ever
/// printing a completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Record a success with the configured step budget (approximation).
    #[default]
    AssumeBudget,
    /// Record an `Unknown` outcome that analysis ignores.
    MarkUnknown,
}

/// Harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// External program's configuration artifact.
    pub config_path: PathBuf,
    /// JSON result store.
    pub results_path: PathBuf,
    /// Executable to launch.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the child, defaults to the current directory.
    pub working_dir: Option<PathBuf>,
    /// Smallest parameter value (inclusive).
    pub min_parameter: u32,
    /// Largest parameter value (inclusive).
    pub max_parameter: u32,
    /// Wall-clock budget per run, in seconds.
    pub timeout_secs: u64,
    /// Wait between graceful and forced termination, in milliseconds.
    pub grace_period_ms: u64,
    /// Wait after the completion line before terminating, in milliseconds.
    pub post_completion_delay_ms: u64,
    /// Step budget recorded under [`FallbackPolicy::AssumeBudget`].
    pub max_steps: u64,
    /// Consecutive non-successes that trigger a config reset.
    pub failure_threshold: u32,
    /// Policy for a clean exit without completion line.
    pub fallback_policy: FallbackPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("secondSimulation/parameters/configuration.ini"),
            results_path: PathBuf::from("simulation_results.json"),
            program: "java".to_string(),
            args: vec![
                "-cp".to_string(),
                "bin:lib/*".to_string(),
                "simulator.MySimFactory".to_string(),
            ],
            working_dir: None,
            min_parameter: 1,
            max_parameter: 10,
            timeout_secs: 60,
            grace_period_ms: 1_000,
            post_completion_delay_ms: 1_000,
            max_steps: 1_200,
            failure_threshold: 2,
            fallback_policy: FallbackPolicy::AssumeBudget,
        }
    }
}

impl HarnessConfig {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Load a configuration from a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Settings(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check range and timing invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.min_parameter == 0 {
            return Err(Error::Settings("min_parameter must be at least 1".into()));
        }
        if self.min_parameter > self.max_parameter {
            return Err(Error::Settings(format!(
                "min_parameter ({}) exceeds max_parameter ({})",
                self.min_parameter, self.max_parameter
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Settings("timeout_secs must be positive".into()));
        }
        if self.failure_threshold == 0 {
            return Err(Error::Settings("failure_threshold must be positive".into()));
        }
        if self.program.trim().is_empty() {
            return Err(Error::Settings("program must not be empty".into()));
        }
        Ok(())
    }

    /// Per-run wall-clock budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Graceful termination window.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Flush window after a completion line.
    #[must_use]
    pub const fn post_completion_delay(&self) -> Duration {
        Duration::from_millis(self.post_completion_delay_ms)
    }
}

/// Builder for `HarnessConfig`.
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// Set the configuration artifact path.
    #[must_use]
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = path.into();
        self
    }

    /// Set the result store path.
    #[must_use]
    pub fn results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.results_path = path.into();
        self
    }

    /// Set the program and its arguments.
    #[must_use]
    pub fn command<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.program = program.into();
        self.config.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = Some(dir.into());
        self
    }

    /// Set the inclusive parameter range.
    #[must_use]
    pub const fn range(mut self, min: u32, max: u32) -> Self {
        self.config.min_parameter = min;
        self.config.max_parameter = max;
        self
    }

    /// Set the per-run timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Set the grace period in milliseconds.
    #[must_use]
    pub const fn grace_period_ms(mut self, ms: u64) -> Self {
        self.config.grace_period_ms = ms;
        self
    }

    /// Set the post-completion flush delay in milliseconds.
    #[must_use]
    pub const fn post_completion_delay_ms(mut self, ms: u64) -> Self {
        self.config.post_completion_delay_ms = ms;
        self
    }

    /// Set the fallback step budget.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.config.max_steps = steps;
        self
    }

    /// Set the consecutive-failure threshold.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the silent-exit fallback policy.
    #[must_use]
    pub const fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.config.fallback_policy = policy;
        self
    }

    /// Build the `HarnessConfig`.
    #[must_use]
    pub fn build(self) -> HarnessConfig {
        self.config
    }
}
