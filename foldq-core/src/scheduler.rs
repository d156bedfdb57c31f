//! Scheduler contracts
//!
//! The engine talks to the batch scheduler only through these traits. The
//! real client (`foldq-slurm::SlurmClient`) and the simulated scheduler
//! implement the same `SchedulerClient` surface, so the rest of the system
//! is unaware which is in use.
//!
//! Status lookups go through `StatusQuery` tiers composed by `TieredQuery`:
//! the active queue first, then the accounting backend, then a weaker
//! last-chance source. `NotFound` is a valid outcome meaning "this tier has
//! no record", not an error; a command failure or timeout is a `QueryError`
//! and is treated as transient by the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::job::Job;

/// State of a job as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Pending,
    Running,
    Completed,
    /// Any terminal-failure class outcome (cancelled, timeout, node
    /// failure, out-of-memory, preempted), carrying the raw state token.
    Failed { reason: String },
}

/// Outcome of a status query against one tier (or the composed tiers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    State(SchedulerState),
    /// The queried source has no record of the job. Not necessarily
    /// terminal; the caller falls through to the next tier.
    NotFound,
}

/// Errors from submit/cancel operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("cancel failed: {0}")]
    Cancel(String),
}

/// Errors from status queries. Always transient from the reconciler's
/// perspective: the job is skipped this cycle and retried on the next.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("scheduler command timed out after {0:?}")]
    Timeout(Duration),
    #[error("scheduler command failed: {0}")]
    Invocation(String),
}

/// The full scheduler surface consumed by the engine.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Submits `script` for `job` and returns the scheduler-assigned id.
    async fn submit(&self, job: &Job, script: &str) -> Result<String, SchedulerError>;

    /// Looks up the current state of a submitted job.
    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError>;

    /// Best-effort cancellation. Fails only on a hard invocation failure,
    /// not when the target job has already left the queue.
    async fn cancel(&self, external_id: &str) -> Result<(), SchedulerError>;
}

/// One source of job status, independently testable.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    /// Short name for logging ("squeue", "sacct", ...).
    fn tier(&self) -> &'static str;

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError>;
}

/// Fixed-order fallback over query tiers.
///
/// Stops at the first tier that returns a positive result; `NotFound`
/// falls through. Errors propagate immediately so a transient command
/// failure is never mistaken for "no record".
pub struct TieredQuery {
    tiers: Vec<Arc<dyn StatusQuery>>,
}

impl TieredQuery {
    pub fn new(tiers: Vec<Arc<dyn StatusQuery>>) -> Self {
        Self { tiers }
    }

    pub async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        for tier in &self.tiers {
            match tier.query(external_id).await? {
                QueryResult::State(state) => return Ok(QueryResult::State(state)),
                QueryResult::NotFound => continue,
            }
        }
        Ok(QueryResult::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTier {
        name: &'static str,
        result: Result<QueryResult, &'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedTier {
        fn new(name: &'static str, result: Result<QueryResult, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusQuery for ScriptedTier {
        fn tier(&self) -> &'static str {
            self.name
        }

        async fn query(&self, _external_id: &str) -> Result<QueryResult, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(msg) => Err(QueryError::Invocation(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn stops_at_first_positive_tier() {
        let active = ScriptedTier::new("squeue", Ok(QueryResult::NotFound));
        let history = ScriptedTier::new(
            "sacct",
            Ok(QueryResult::State(SchedulerState::Completed)),
        );
        let fallback = ScriptedTier::new("scontrol", Ok(QueryResult::NotFound));

        let tiered = TieredQuery::new(vec![
            active.clone(),
            history.clone(),
            fallback.clone(),
        ]);

        let result = tiered.query("42").await.unwrap();
        assert_eq!(result, QueryResult::State(SchedulerState::Completed));
        assert_eq!(active.calls(), 1);
        assert_eq!(history.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn falls_through_to_last_tier() {
        let active = ScriptedTier::new("squeue", Ok(QueryResult::NotFound));
        let history = ScriptedTier::new("sacct", Ok(QueryResult::NotFound));
        let fallback = ScriptedTier::new(
            "scontrol",
            Ok(QueryResult::State(SchedulerState::Failed {
                reason: "OUT_OF_MEMORY".to_string(),
            })),
        );

        let tiered = TieredQuery::new(vec![active, history, fallback]);
        match tiered.query("42").await.unwrap() {
            QueryResult::State(SchedulerState::Failed { reason }) => {
                assert_eq!(reason, "OUT_OF_MEMORY");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn universal_not_found_is_not_found() {
        let tiered = TieredQuery::new(vec![
            ScriptedTier::new("squeue", Ok(QueryResult::NotFound)),
            ScriptedTier::new("sacct", Ok(QueryResult::NotFound)),
        ]);
        assert_eq!(tiered.query("42").await.unwrap(), QueryResult::NotFound);
    }

    #[tokio::test]
    async fn tier_error_propagates_instead_of_falling_through() {
        let failing = ScriptedTier::new("squeue", Err("connection refused"));
        let history = ScriptedTier::new(
            "sacct",
            Ok(QueryResult::State(SchedulerState::Completed)),
        );

        let tiered = TieredQuery::new(vec![failing, history.clone()]);
        assert!(tiered.query("42").await.is_err());
        // The later tier was never consulted: an error is transient, not
        // evidence of absence.
        assert_eq!(history.calls(), 0);
    }
}
