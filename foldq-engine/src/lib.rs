//! foldq Engine
//!
//! Orchestration layer: turns job requests into scheduler submissions and
//! reconciles scheduler-reported state with locally stored state.
//!
//! - `runner`: the registry and the per-tool script builders
//! - `store`: the persistence seam and per-job locking
//! - `coordinator`: create/submit/cancel with compensating transitions
//! - `reconciler`: the polling loop
//! - `config`: env-driven daemon configuration

pub mod config;
pub mod coordinator;
pub mod reconciler;
pub mod runner;
pub mod store;
