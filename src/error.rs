//! Error types for the sweep harness
//!
//! Every variant names the artifact or run it concerns so the operator can
//! act on the message without re-reading logs.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Sweep harness error types
#[derive(Error, Debug)]
pub enum Error {
    /// The sweep field was not found in the section that owns it
    #[error("Config field '{field}' not found in section [{section}]\nThe external program will keep its previous value")]
    ConfigFieldNotFound {
        /// Field name that was searched for
        field: String,
        /// Section that should own the field
        section: String,
    },

    /// Sweep parameters must be positive integers
    #[error("Invalid sweep parameter {0}: must be a positive integer")]
    InvalidParameter(i64),

    /// Resetting the config artifact to defaults failed (unrecoverable)
    #[error("Config reset failed: {0}\nThe sweep cannot recover from a corrupted configuration")]
    ConfigReset(String),

    /// The external program could not be launched
    #[error("Failed to spawn external program: {0}")]
    Spawn(String),

    /// Supervision of a running child failed
    #[error("Supervision error: {0}")]
    Supervision(String),

    /// Result store content could not be parsed
    #[error("Result store corrupt: {0}")]
    StoreCorrupt(String),

    /// A persisted artifact could not be written (unrecoverable)
    #[error("Failed to persist {}: {source}", path.display())]
    Persist {
        /// Target file
        path: PathBuf,
        /// Underlying IO failure
        source: std::io::Error,
    },

    /// Curve fit did not produce a usable model
    #[error("Model fit failed: {0}")]
    FitFailed(String),

    /// Not enough successful runs for the requested analysis
    #[error("Insufficient data: need at least {required} successful runs, found {found}")]
    InsufficientData {
        /// Minimum number of points
        required: usize,
        /// Points available
        found: usize,
    },

    /// No result store to analyze
    #[error("No results found at {}\nRun the sweep first", .0.display())]
    NoResults(PathBuf),

    /// Harness configuration is invalid
    #[error("Invalid harness settings: {0}")]
    Settings(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
