//! foldq Core
//!
//! Domain types and abstractions for the foldq job orchestration engine.
//!
//! This crate contains:
//! - Domain types: the `Job` lifecycle model and `ResourceConfig`
//! - Scheduler contracts: the client trait, query results, and the
//!   fixed-order tiered query combinator
//! - The injectable clock used by time-dependent logic
//!
//! Everything here is pure and in-memory; process invocation lives in
//! `foldq-slurm`, orchestration in `foldq-engine`.

pub mod clock;
pub mod domain;
pub mod scheduler;
