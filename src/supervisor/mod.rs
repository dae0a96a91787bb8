//! Run supervisor
//!
//! Launches the external program, streams its output while a wall-clock
//! deadline runs, and reduces the run to a single [`RunOutcome`].
//!
//! ```text
//!   spawn ──> read stdout lines ──┬─ completion line ─> flush delay ─> TERM ─(grace)─> KILL
//!                                 ├─ deadline hit ────> KILL ─────────────────────────> TimedOut
//!                                 └─ exit + EOF/grace ─> corruption? crashed? fallback?
//! ```
//!
//! The whole call is bounded by `timeout` plus one grace period.

mod markers;
mod shutdown;

pub use markers::{detect_config_corruption, match_completion, CompletionMatcher, COMPLETION_MATCHERS};
pub use shutdown::{force_kill, terminate, Termination};

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{FallbackPolicy, HarnessConfig};
use crate::experiment::Outcome;
use crate::{Error, Result};

/// Captured lines kept per stream for post-exit diagnosis.
const TAIL_LINES: usize = 4096;

/// Result of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A completion line was seen.
    Completed {
        /// Steps reported by the external program.
        steps: u64,
        /// Matcher that recognized the line.
        matcher: &'static str,
    },
    /// Clean exit without completion line; the step budget is assumed.
    AssumedBudget {
        /// Configured step budget.
        steps: u64,
    },
    /// Clean exit without completion line; nothing assumed.
    Unknown,
    /// No completion line before the deadline.
    TimedOut,
    /// The external program rejected its configuration artifact.
    ConfigCorrupted,
    /// Non-zero exit without completion line.
    Crashed {
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
    },
}

impl RunOutcome {
    /// Outcome as stored in the result ledger.
    #[must_use]
    pub const fn to_outcome(&self) -> Outcome {
        match self {
            Self::Completed { steps, .. } | Self::AssumedBudget { steps } => Outcome::Steps(*steps),
            Self::Unknown => Outcome::Unknown,
            Self::TimedOut => Outcome::Timeout,
            Self::ConfigCorrupted => Outcome::ConfigCorrupted,
            Self::Crashed { .. } => Outcome::Crashed,
        }
    }
}

/// Executes one run of the external program.
///
/// [`RunSupervisor`] is the process-backed implementation; the controller
/// only depends on this trait.
pub trait Runner: Send + Sync {
    /// Run once, bounded by `timeout` plus a short grace period.
    ///
    /// # Errors
    ///
    /// Returns error if the program cannot be launched or supervised.
    fn execute(&self, timeout: Duration) -> impl Future<Output = Result<RunOutcome>> + Send;
}

/// Process-backed [`Runner`].
#[derive(Debug, Clone)]
pub struct RunSupervisor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    grace_period: Duration,
    post_completion_delay: Duration,
    max_steps: u64,
    fallback: FallbackPolicy,
}

impl RunSupervisor {
    /// Supervisor for `program args...` with default timing knobs.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let defaults = HarnessConfig::default();
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            grace_period: defaults.grace_period(),
            post_completion_delay: defaults.post_completion_delay(),
            max_steps: defaults.max_steps,
            fallback: defaults.fallback_policy,
        }
    }

    /// Supervisor configured from the harness settings.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            grace_period: config.grace_period(),
            post_completion_delay: config.post_completion_delay(),
            max_steps: config.max_steps,
            fallback: config.fallback_policy,
        }
    }

    /// Set the graceful termination window.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the wait between the completion line and the stop request.
    #[must_use]
    pub const fn with_post_completion_delay(mut self, delay: Duration) -> Self {
        self.post_completion_delay = delay;
        self
    }

    /// Set the silent-exit policy and its step budget.
    #[must_use]
    pub const fn with_fallback(mut self, policy: FallbackPolicy, max_steps: u64) -> Self {
        self.fallback = policy;
        self.max_steps = max_steps;
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn supervise(&self, timeout: Duration) -> Result<RunOutcome> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!(program = %self.program, args = ?self.args, "launching external program");
        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {e}", self.program)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Supervision("missing stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Supervision("missing stderr pipe".into()))?;

        let stderr_task = tokio::spawn(collect_tail(stderr, "stderr"));
        let mut lines = LossyLines::new(stdout);
        let mut stdout_tail = Tail::default();
        let mut stdout_open = true;
        let mut exit_status = None;
        // set once the child exits; bounds the stdout drain and stderr wait
        let mut settle_by = None;

        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);
        let drain = tokio::time::sleep_until(deadline);
        tokio::pin!(drain);

        let completion = loop {
            if !stdout_open && exit_status.is_some() {
                break None;
            }
            tokio::select! {
                () = &mut expiry, if exit_status.is_none() => {
                    warn!(timeout_secs = timeout.as_secs_f64(), "run timed out, killing");
                    force_kill(&mut child).await?;
                    stderr_task.abort();
                    return Ok(RunOutcome::TimedOut);
                }
                () = &mut drain, if exit_status.is_some() => {
                    warn!("stdout still open after exit, classifying without it");
                    stdout_open = false;
                }
                line = lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        debug!(target: "sweep_harness::child", "{line}");
                        if let Some(found) = match_completion(&line) {
                            break Some(found);
                        }
                        stdout_tail.push(line);
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        warn!(error = %e, "stdout read failed");
                        stdout_open = false;
                    }
                },
                status = child.wait(), if exit_status.is_none() => {
                    exit_status = Some(status?);
                    let by = Instant::now() + self.grace_period;
                    drain.as_mut().reset(by);
                    settle_by = Some(by);
                }
            }
        };

        if let Some((matcher, steps)) = completion {
            info!(steps, matcher, elapsed_ms = started.elapsed().as_millis(), "completion detected");
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.post_completion_delay.min(remaining)).await;
            let how = terminate(&mut child, self.grace_period).await?;
            debug!(?how, "external program stopped");
            stderr_task.abort();
            return Ok(RunOutcome::Completed { steps, matcher });
        }

        let status = match exit_status {
            Some(status) => status,
            None => child.wait().await?,
        };
        let settle_by = settle_by.unwrap_or_else(|| Instant::now() + self.grace_period);
        let mut stderr_tail = match tokio::time::timeout_at(settle_by, stderr_task).await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                warn!(error = %e, "stderr collector failed");
                Tail::default()
            }
            Err(_) => {
                warn!("stderr still open after exit, ignoring it");
                Tail::default()
            }
        };

        if detect_config_corruption(stdout_tail.as_slice())
            || detect_config_corruption(stderr_tail.as_slice())
        {
            warn!("external program reported a corrupted configuration artifact");
            return Ok(RunOutcome::ConfigCorrupted);
        }

        if !status.success() {
            warn!(exit_code = ?status.code(), "external program failed without completing");
            return Ok(RunOutcome::Crashed {
                exit_code: status.code(),
            });
        }

        Ok(match self.fallback {
            FallbackPolicy::AssumeBudget => {
                warn!(steps = self.max_steps, "no completion line; assuming full step budget");
                RunOutcome::AssumedBudget {
                    steps: self.max_steps,
                }
            }
            FallbackPolicy::MarkUnknown => {
                warn!("no completion line; recording unknown outcome");
                RunOutcome::Unknown
            }
        })
    }
}

impl Runner for RunSupervisor {
    fn execute(&self, timeout: Duration) -> impl Future<Output = Result<RunOutcome>> + Send {
        self.supervise(timeout)
    }
}

/// Line reader that decodes each line lossily, so non-UTF-8 output from the
/// child never ends the stream.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(stream: R) -> Self {
        Self {
            reader: BufReader::new(stream),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` at EOF.
    ///
    /// Cancel safe: bytes read before cancellation stay in `buf` and are
    /// completed by the next call.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.reader.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut end = self.buf.len();
        if self.buf[..end].ends_with(b"\n") {
            end -= 1;
        }
        if self.buf[..end].ends_with(b"\r") {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Bounded tail of captured output lines.
#[derive(Debug, Default)]
struct Tail(VecDeque<String>);

impl Tail {
    fn push(&mut self, line: String) {
        if self.0.len() == TAIL_LINES {
            self.0.pop_front();
        }
        self.0.push_back(line);
    }

    fn as_slice(&mut self) -> &[String] {
        self.0.make_contiguous()
    }
}

async fn collect_tail<R>(stream: R, name: &'static str) -> Tail
where
    R: AsyncRead + Unpin,
{
    let mut tail = Tail::default();
    let mut lines = LossyLines::new(stream);
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(target: "sweep_harness::child", stream = name, "{line}");
                tail.push(line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(stream = name, error = %e, "stream read failed");
                break;
            }
        }
    }
    tail
}
