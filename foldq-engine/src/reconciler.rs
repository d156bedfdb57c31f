//! Polling reconciler
//!
//! On a fixed cadence, fetches every job still tracked against the
//! scheduler (`Pending` or `Running`), queries its current external state
//! through the tiered query, and applies the state-machine transition.
//! Jobs are processed sequentially under their per-job lock; one job's
//! transient failure is logged and retried next cycle without aborting the
//! rest of the cycle. Re-processing a job is always a no-op thanks to the
//! sticky-terminal rule, so reconciliation is safely at-least-once.
//!
//! A job no tier knows about is handled conservatively: it is only failed
//! after a stale timeout, or inferred completed when the workdir carries
//! result artifacts (a last-resort path that is explicitly logged).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use foldq_core::clock::Clock;
use foldq_core::domain::job::Job;
use foldq_core::scheduler::{QueryError, QueryResult, SchedulerClient, SchedulerState};

use crate::store::{JobLocks, JobStore, StoreError};

const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
enum ReconcileError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PollingReconciler {
    store: Arc<dyn JobStore>,
    locks: Arc<JobLocks>,
    scheduler: Arc<dyn SchedulerClient>,
    clock: Arc<dyn Clock>,
    /// How long a submitted job may stay invisible to every query tier
    /// before it is declared lost.
    stale_after: Duration,
}

impl PollingReconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: Arc<JobLocks>,
        scheduler: Arc<dyn SchedulerClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            locks,
            scheduler,
            clock,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Runs the polling loop forever.
    pub async fn run(&self, poll_interval: Duration) {
        info!("starting reconciler (interval: {poll_interval:?})");
        let mut interval = time::interval(poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.poll_once().await {
                Ok(transitions) => {
                    if transitions > 0 {
                        info!("applied {transitions} transition(s) this cycle");
                    }
                }
                Err(err) => {
                    error!("reconciliation cycle failed: {err}");
                }
            }
        }
    }

    /// One reconciliation cycle. Returns the number of applied transitions.
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        let jobs = self.store.list_active().await?;
        debug!("reconciling {} active job(s)", jobs.len());

        let mut transitions = 0;
        for job in jobs {
            match self.reconcile_job(job.id).await {
                Ok(true) => transitions += 1,
                Ok(false) => {}
                // Transient: leave the job as-is and retry next cycle.
                Err(err) => warn!("job {}: reconciliation skipped: {err}", job.id),
            }
        }
        Ok(transitions)
    }

    async fn reconcile_job(&self, job_id: Uuid) -> Result<bool, ReconcileError> {
        let _guard = self.locks.acquire(job_id).await;

        // Re-read under the lock; a cancellation may have raced the cycle.
        let Some(mut job) = self.store.get(job_id).await? else {
            return Ok(false);
        };
        if !job.state.is_active() {
            return Ok(false);
        }
        let Some(external_id) = job.external_id.clone() else {
            return Ok(false);
        };

        match self.scheduler.query(&external_id).await? {
            QueryResult::State(state) => {
                let now = self.clock.now();
                if let Some(transition) = job.apply_report(state, now) {
                    self.store.save(&job).await?;
                    info!("job {}: {} -> {}", job.id, transition.from, transition.to);
                    return Ok(true);
                }
                Ok(false)
            }
            QueryResult::NotFound => self.handle_unseen(&mut job).await,
        }
    }

    /// No query tier knows the job. Never promote to a terminal state on
    /// absence alone: prefer result artifacts as positive evidence, then
    /// fall back to the stale timeout, otherwise wait for the next cycle.
    async fn handle_unseen(&self, job: &mut Job) -> Result<bool, ReconcileError> {
        let now = self.clock.now();

        if has_result_artifacts(job) {
            warn!(
                "job {}: unknown to the scheduler but output artifacts exist; \
                 inferring completion",
                job.id
            );
            if let Some(transition) = job.apply_report(SchedulerState::Completed, now) {
                self.store.save(job).await?;
                info!("job {}: {} -> {}", job.id, transition.from, transition.to);
                return Ok(true);
            }
            return Ok(false);
        }

        let stale = job
            .submitted_at
            .map(|submitted_at| {
                (now - submitted_at).to_std().unwrap_or_default() > self.stale_after
            })
            .unwrap_or(false);
        if stale {
            job.mark_failed(
                "Job not found in the scheduler. It may have failed before being \
                 scheduled, or the scheduler lost track of it."
                    .to_string(),
                now,
            );
            self.store.save(job).await?;
            warn!("job {}: marked FAILED after going stale", job.id);
            return Ok(true);
        }

        debug!("job {}: not visible to any query tier yet", job.id);
        Ok(false)
    }
}

/// True when the output directory holds anything beyond scheduler logs.
fn has_result_artifacts(job: &Job) -> bool {
    let Ok(entries) = std::fs::read_dir(job.output_dir()) else {
        return false;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("slurm-") && (name.ends_with(".out") || name.ends_with(".err")) {
            continue;
        }
        return true;
    }
    false
}
