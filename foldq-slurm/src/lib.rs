//! foldq SLURM layer
//!
//! The only crate that invokes external processes. Provides:
//! - `SlurmClient`: the real scheduler client wrapping `sbatch`, `squeue`,
//!   `sacct`, `scontrol`, and `scancel` with bounded timeouts
//! - `SimulatedScheduler`: a drop-in `SchedulerClient` for environments
//!   without a cluster, driven by an injectable clock
//!
//! Output parsing is isolated in `parse` so each format quirk is testable
//! without a scheduler.

mod client;
mod command;
pub mod parse;
mod query;
mod simulation;

pub use client::{SlurmClient, SlurmCommands};
pub use query::{AccountingQuery, ActiveQueueQuery, ControlDaemonQuery};
pub use simulation::SimulatedScheduler;
