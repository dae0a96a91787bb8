//! # Sweep Harness: Resumable Parameter Sweeps over an External Simulation
//!
//! The harness repeatedly reconfigures and runs an opaque, long-running
//! simulation program, measures one step count per run, persists every
//! result as it arrives, and fits a performance model afterwards.
//!
//! ## Components
//!
//! - [`editor`]: surgical edits of the external configuration artifact
//! - [`supervisor`]: child process supervision with timeout and two-phase termination
//! - [`experiment`]: run records and the resumable result store
//! - [`sweep`]: the controller state machine with failure recovery
//! - [`analysis`]: empirical optima and the `a/n + b + c·n` model fit
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sweep_harness::sweep::{SweepController, SweepPlan};
//! use sweep_harness::HarnessConfig;
//!
//! # async fn example() -> sweep_harness::Result<()> {
//! let config = HarnessConfig::builder().range(1, 10).timeout_secs(60).build();
//! let mut controller = SweepController::from_config(&config)?;
//! let summary = controller.run(&SweepPlan::from_config(&config)).await?;
//! println!("{} runs, {} succeeded", summary.launched, summary.succeeded);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod config;
pub mod editor;
pub mod error;
pub mod experiment;
mod persist;
pub mod supervisor;
pub mod sweep;

pub use config::{FallbackPolicy, HarnessConfig};
pub use error::{Error, Result};
