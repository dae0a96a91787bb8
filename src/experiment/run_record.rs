//! Run Record - one measured run of the external program

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Legacy timestamp layout written by earlier sweep tools.
const LEGACY_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Status of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The external program reported completion (or the budget fallback applied).
    Success,
    /// Timeout, crash, or configuration corruption.
    Failed,
    /// Clean exit with no completion line, under the mark-unknown policy.
    Unknown,
}

/// Measured result of one run.
///
/// Serialized as a bare integer for step counts and as an upper-case
/// sentinel string otherwise, so result files stay diffable by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// All work finished after this many simulation steps.
    Steps(u64),
    /// No completion line before the wall-clock budget ran out.
    Timeout,
    /// Non-zero exit without a completion line.
    Crashed,
    /// The external program choked on a malformed configuration artifact.
    ConfigCorrupted,
    /// Clean exit, no completion line, nothing assumed.
    Unknown,
}

impl Outcome {
    /// Step count, for successful outcomes.
    #[must_use]
    pub const fn steps(self) -> Option<u64> {
        match self {
            Self::Steps(n) => Some(n),
            _ => None,
        }
    }

    /// Status implied by this outcome.
    #[must_use]
    pub const fn status(self) -> RunStatus {
        match self {
            Self::Steps(_) => RunStatus::Success,
            Self::Unknown => RunStatus::Unknown,
            Self::Timeout | Self::Crashed | Self::ConfigCorrupted => RunStatus::Failed,
        }
    }

    const fn sentinel(self) -> Option<&'static str> {
        match self {
            Self::Steps(_) => None,
            Self::Timeout => Some("TIMEOUT"),
            Self::Crashed => Some("CRASHED"),
            Self::ConfigCorrupted => Some("CONFIG_CORRUPTED"),
            Self::Unknown => Some("UNKNOWN"),
        }
    }

    fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.to_ascii_uppercase().as_str() {
            "TIMEOUT" => Some(Self::Timeout),
            "CRASHED" | "FAILED" => Some(Self::Crashed),
            "CONFIG_CORRUPTED" => Some(Self::ConfigCorrupted),
            "UNKNOWN" => Some(Self::Unknown),
            _ => text.parse().ok().map(Self::Steps),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.sentinel()) {
            (Self::Steps(n), _) => write!(f, "{n} steps"),
            (_, Some(s)) => f.write_str(s),
            (_, None) => Ok(()),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self, self.sentinel()) {
            (Self::Steps(n), _) => serializer.serialize_u64(*n),
            (_, Some(s)) => serializer.serialize_str(s),
            (_, None) => Err(serde::ser::Error::custom("outcome without sentinel")),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self::Steps(n)),
            Raw::Text(s) => Self::from_text(&s)
                .ok_or_else(|| de::Error::custom(format!("unrecognized outcome {s:?}"))),
        }
    }
}

/// Run Record represents one measurement in a sweep.
///
/// Field names on disk (`num_robots`, `total_steps`, `timestamp`) match the
/// result files produced by earlier sweep tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredRecord")]
pub struct RunRecord {
    #[serde(rename = "num_robots")]
    parameter: u32,
    #[serde(rename = "total_steps")]
    outcome: Outcome,
    status: RunStatus,
    #[serde(rename = "timestamp")]
    observed_at: DateTime<Utc>,
}

/// On-disk shape accepted on load. Older files carry no `status`.
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(rename = "num_robots", alias = "parameter")]
    parameter: u32,
    #[serde(rename = "total_steps", alias = "outcome")]
    outcome: Outcome,
    #[serde(default)]
    status: Option<RunStatus>,
    #[serde(
        rename = "timestamp",
        alias = "observed_at",
        deserialize_with = "deserialize_timestamp"
    )]
    observed_at: DateTime<Utc>,
}

impl From<StoredRecord> for RunRecord {
    fn from(raw: StoredRecord) -> Self {
        Self {
            parameter: raw.parameter,
            outcome: raw.outcome,
            status: raw.status.unwrap_or_else(|| raw.outcome.status()),
            observed_at: raw.observed_at,
        }
    }
}

impl RunRecord {
    /// Create a record observed now, with status derived from the outcome.
    #[must_use]
    pub fn new(parameter: u32, outcome: Outcome) -> Self {
        Self {
            parameter,
            outcome,
            status: outcome.status(),
            observed_at: Utc::now(),
        }
    }

    /// Create a builder for constructing a record with a fixed timestamp.
    #[must_use]
    pub fn builder(parameter: u32, outcome: Outcome) -> RunRecordBuilder {
        RunRecordBuilder::new(parameter, outcome)
    }

    /// Get the sweep parameter value.
    #[must_use]
    pub const fn parameter(&self) -> u32 {
        self.parameter
    }

    /// Get the measured outcome.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Get the run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the observation timestamp.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Step count when the run succeeded.
    #[must_use]
    pub const fn steps(&self) -> Option<u64> {
        match self.status {
            RunStatus::Success => self.outcome.steps(),
            RunStatus::Failed | RunStatus::Unknown => None,
        }
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    parameter: u32,
    outcome: Outcome,
    observed_at: DateTime<Utc>,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(parameter: u32, outcome: Outcome) -> Self {
        Self {
            parameter,
            outcome,
            observed_at: Utc::now(),
        }
    }

    /// Set a custom observation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            parameter: self.parameter,
            outcome: self.outcome,
            status: self.outcome.status(),
            observed_at: self.observed_at,
        }
    }
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, LEGACY_TIMESTAMP)
        .map(|naive| naive.and_utc())
        .map_err(|e| de::Error::custom(format!("bad timestamp {raw:?}: {e}")))
}
