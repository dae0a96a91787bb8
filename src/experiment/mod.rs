//! Experiment ledger
//!
//! Data structures for recording one sweep session.
//!
//! ## Schema Overview
//!
//! ```text
//! ResultStore (1) ──< RunRecord (N, one per parameter value)
//!                         │
//!                         └── Outcome: Steps(n) | TIMEOUT | CRASHED | CONFIG_CORRUPTED | UNKNOWN
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use sweep_harness::experiment::{Outcome, RunRecord, RunStatus};
//!
//! let record = RunRecord::new(4, Outcome::Steps(55));
//! assert_eq!(record.status(), RunStatus::Success);
//! assert_eq!(record.steps(), Some(55));
//! ```

mod run_record;
mod store;

pub use run_record::{Outcome, RunRecord, RunRecordBuilder, RunStatus};
pub use store::ResultStore;
