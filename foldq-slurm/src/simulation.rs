//! Simulated scheduler
//!
//! Drop-in `SchedulerClient` for environments without a cluster. Every
//! submitted job follows a deterministic schedule measured from submission
//! on the injected clock: pending for a short delay, then running, then
//! completed. On completion a placeholder results file is written so the
//! output-consumption path behaves as it would with a real tool run.
//!
//! No external process is ever invoked.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use foldq_core::clock::Clock;
use foldq_core::domain::job::Job;
use foldq_core::scheduler::{
    QueryError, QueryResult, SchedulerClient, SchedulerError, SchedulerState,
};

const DEFAULT_PENDING_FOR: Duration = Duration::from_secs(5);
const DEFAULT_RUNNING_FOR: Duration = Duration::from_secs(10);

struct SimJob {
    submitted_at: DateTime<Utc>,
    workdir: PathBuf,
    cancelled: bool,
    output_written: bool,
}

/// In-memory fake of the batch scheduler.
pub struct SimulatedScheduler {
    clock: Arc<dyn Clock>,
    pending_for: Duration,
    running_for: Duration,
    jobs: Mutex<HashMap<String, SimJob>>,
}

impl SimulatedScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_delays(clock, DEFAULT_PENDING_FOR, DEFAULT_RUNNING_FOR)
    }

    /// `pending_for` is how long a job stays queued after submission;
    /// `running_for` is how long it then runs before completing.
    pub fn with_delays(
        clock: Arc<dyn Clock>,
        pending_for: Duration,
        running_for: Duration,
    ) -> Self {
        Self {
            clock,
            pending_for,
            running_for,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn write_results(&self, workdir: &std::path::Path) {
        let outdir = workdir.join("output");
        if let Err(e) = std::fs::create_dir_all(&outdir) {
            warn!("simulated scheduler could not create {}: {e}", outdir.display());
            return;
        }
        let results = outdir.join("results.txt");
        if let Err(e) = std::fs::write(&results, "Simulated run completed successfully.\n") {
            warn!("simulated scheduler could not write {}: {e}", results.display());
        }
    }
}

#[async_trait]
impl SchedulerClient for SimulatedScheduler {
    async fn submit(&self, job: &Job, _script: &str) -> Result<String, SchedulerError> {
        let external_id = format!("SIM-{}", job.id);
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(
            external_id.clone(),
            SimJob {
                submitted_at: self.clock.now(),
                workdir: job.workdir.clone(),
                cancelled: false,
                output_written: false,
            },
        );
        Ok(external_id)
    }

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(entry) = jobs.get_mut(external_id) else {
            return Ok(QueryResult::NotFound);
        };

        if entry.cancelled {
            return Ok(QueryResult::State(SchedulerState::Failed {
                reason: "CANCELLED".to_string(),
            }));
        }

        let elapsed = (self.clock.now() - entry.submitted_at)
            .to_std()
            .unwrap_or_default();

        let state = if elapsed < self.pending_for {
            SchedulerState::Pending
        } else if elapsed < self.pending_for + self.running_for {
            SchedulerState::Running
        } else {
            if !entry.output_written {
                entry.output_written = true;
                let workdir = entry.workdir.clone();
                drop(jobs);
                self.write_results(&workdir);
            }
            return Ok(QueryResult::State(SchedulerState::Completed));
        };
        Ok(QueryResult::State(state))
    }

    async fn cancel(&self, external_id: &str) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(external_id) {
            entry.cancelled = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldq_core::clock::ManualClock;

    fn setup() -> (Arc<ManualClock>, SimulatedScheduler, Job, tempfile::TempDir) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = SimulatedScheduler::new(clock.clone());
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new("sim", "boltz-2", dir.path(), clock.now());
        (clock, scheduler, job, dir)
    }

    #[tokio::test]
    async fn follows_pending_running_completed_schedule() {
        let (clock, scheduler, job, _dir) = setup();
        let id = scheduler.submit(&job, "#!/bin/bash\n").await.unwrap();
        assert!(id.starts_with("SIM-"));

        assert_eq!(
            scheduler.query(&id).await.unwrap(),
            QueryResult::State(SchedulerState::Pending)
        );

        clock.advance(Duration::from_secs(6));
        assert_eq!(
            scheduler.query(&id).await.unwrap(),
            QueryResult::State(SchedulerState::Running)
        );

        clock.advance(Duration::from_secs(10));
        assert_eq!(
            scheduler.query(&id).await.unwrap(),
            QueryResult::State(SchedulerState::Completed)
        );
        assert!(job.output_dir().join("results.txt").exists());
    }

    #[tokio::test]
    async fn completion_is_stable_across_repeated_queries() {
        let (clock, scheduler, job, _dir) = setup();
        let id = scheduler.submit(&job, "").await.unwrap();
        clock.advance(Duration::from_secs(60));
        for _ in 0..3 {
            assert_eq!(
                scheduler.query(&id).await.unwrap(),
                QueryResult::State(SchedulerState::Completed)
            );
        }
    }

    #[tokio::test]
    async fn cancelled_job_reports_terminal_failure() {
        let (clock, scheduler, job, _dir) = setup();
        let id = scheduler.submit(&job, "").await.unwrap();
        clock.advance(Duration::from_secs(6));
        scheduler.cancel(&id).await.unwrap();
        match scheduler.query(&id).await.unwrap() {
            QueryResult::State(SchedulerState::Failed { reason }) => {
                assert_eq!(reason, "CANCELLED");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = SimulatedScheduler::new(clock);
        assert_eq!(
            scheduler.query("SIM-missing").await.unwrap(),
            QueryResult::NotFound
        );
    }

    #[tokio::test]
    async fn cancelling_unknown_id_is_best_effort() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = SimulatedScheduler::new(clock);
        assert!(scheduler.cancel("SIM-missing").await.is_ok());
    }
}
