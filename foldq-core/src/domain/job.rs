//! Job domain model and lifecycle state machine
//!
//! A `Job` is the unit of work tracked by the orchestrator. Its state moves
//! along a fixed set of edges and terminal states are sticky: once a job is
//! `Completed`, `Failed`, or `Cancelled`, no further transition is applied,
//! so repeated reconciler observations are idempotent.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduler::SchedulerState;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created locally, not yet handed to the scheduler.
    Created,
    /// Submitted and waiting in the scheduler queue.
    Pending,
    /// Executing on a compute node.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully (including scheduler-side cancellation,
    /// timeout, node failure, out-of-memory, preemption).
    Failed,
    /// Cancelled by a user or API request.
    Cancelled,
}

impl JobState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// States the reconciler still tracks against the scheduler.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Created => "CREATED",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        };
        write!(f, "{name}")
    }
}

/// A state transition that was applied, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: JobState,
    pub to: JobState,
}

/// Job execution record.
///
/// Persisted between polling cycles; the engine mutates it only through the
/// methods below so the invariants (sticky terminal states, timestamps set
/// at most once) hold everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Optional human label; listing-only.
    pub name: String,
    /// Which runner builds this job's submission script. Immutable.
    pub runner_key: String,
    pub state: JobState,
    /// Scheduler-assigned identifier; absent until submission succeeds.
    pub external_id: Option<String>,
    /// Set only when the job fails or is cancelled, never cleared.
    pub error_message: Option<String>,
    /// Tool-specific parameters consumed by the runner at script-build time.
    pub params: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Soft-delete flag. A deleted job is hidden from listings but still
    /// advances through its lifecycle.
    pub deleted: bool,
    /// Unique working directory derived from the job id. Inputs are
    /// materialized under `input/` by the caller before submission; the
    /// tool writes results under `output/`.
    pub workdir: PathBuf,
}

impl Job {
    /// Creates a job in `Created` state with a workdir derived from its id.
    pub fn new(
        name: impl Into<String>,
        runner_key: impl Into<String>,
        base_dir: &Path,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            runner_key: runner_key.into(),
            state: JobState::Created,
            external_id: None,
            error_message: None,
            params: serde_json::Map::new(),
            created_at: now,
            submitted_at: None,
            completed_at: None,
            deleted: false,
            workdir: base_dir.join(id.to_string()),
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.workdir.join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.workdir.join("output")
    }

    /// Records a successful submission: `Created` -> `Pending`.
    pub fn mark_submitted(&mut self, external_id: String, now: DateTime<Utc>) {
        self.external_id = Some(external_id);
        self.submitted_at = Some(now);
        self.state = JobState::Pending;
    }

    /// Records a submission or script-build failure: straight to `Failed`.
    pub fn mark_submit_failed(&mut self, cause: String, now: DateTime<Utc>) {
        self.mark_failed(cause, now);
    }

    /// Moves the job to `Failed` with the given cause. The first recorded
    /// cause wins; `completed_at` is set if not already.
    pub fn mark_failed(&mut self, cause: String, now: DateTime<Utc>) {
        self.fail(cause, now);
    }

    /// Applies a user cancellation request. Returns the transition, or
    /// `None` when the job is already terminal (sticky).
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state.is_terminal() {
            return None;
        }
        let from = self.state;
        self.state = JobState::Cancelled;
        if self.error_message.is_none() {
            self.error_message = Some("Cancelled by user".to_string());
        }
        self.set_completed_at(now);
        Some(Transition {
            from,
            to: JobState::Cancelled,
        })
    }

    /// Applies a scheduler-reported state to a tracked job.
    ///
    /// Returns the transition that was applied, or `None` when nothing
    /// changed: terminal states are sticky, re-observations of the current
    /// state are no-ops, and a `Pending` report never moves a `Running` job
    /// backwards.
    pub fn apply_report(
        &mut self,
        report: SchedulerState,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        if self.state.is_terminal() || self.state == JobState::Created {
            return None;
        }
        let from = self.state;
        match report {
            SchedulerState::Pending => None,
            SchedulerState::Running => {
                if self.state == JobState::Running {
                    return None;
                }
                self.state = JobState::Running;
                Some(Transition {
                    from,
                    to: JobState::Running,
                })
            }
            SchedulerState::Completed => {
                self.state = JobState::Completed;
                self.set_completed_at(now);
                Some(Transition {
                    from,
                    to: JobState::Completed,
                })
            }
            SchedulerState::Failed { reason } => {
                self.fail(format!("Scheduler reported failure: {reason}"), now);
                Some(Transition {
                    from,
                    to: JobState::Failed,
                })
            }
        }
    }

    fn fail(&mut self, cause: String, now: DateTime<Utc>) {
        self.state = JobState::Failed;
        if self.error_message.is_none() {
            self.error_message = Some(cause);
        }
        self.set_completed_at(now);
    }

    /// `completed_at` is set exactly once, never retracted.
    fn set_completed_at(&mut self, now: DateTime<Utc>) {
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("test", "boltz-2", Path::new("/tmp/jobs"), Utc::now())
    }

    #[test]
    fn new_job_starts_created_with_derived_workdir() {
        let job = job();
        assert_eq!(job.state, JobState::Created);
        assert!(job.external_id.is_none());
        assert!(job.workdir.ends_with(job.id.to_string()));
        assert!(job.input_dir().ends_with("input"));
    }

    #[test]
    fn submission_moves_created_to_pending() {
        let mut job = job();
        let now = Utc::now();
        job.mark_submitted("12345".to_string(), now);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.external_id.as_deref(), Some("12345"));
        assert_eq!(job.submitted_at, Some(now));
    }

    #[test]
    fn submission_failure_moves_created_to_failed() {
        let mut job = job();
        job.mark_submit_failed("sbatch failed (rc=1)".to_string(), Utc::now());
        assert_eq!(job.state, JobState::Failed);
        assert!(job.error_message.as_deref().unwrap().contains("sbatch"));
        assert!(job.completed_at.is_some());
        assert!(job.external_id.is_none());
    }

    #[test]
    fn pending_report_on_pending_job_is_noop() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        assert!(job.apply_report(SchedulerState::Pending, Utc::now()).is_none());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn running_report_advances_pending_job() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        let t = job.apply_report(SchedulerState::Running, Utc::now()).unwrap();
        assert_eq!(t.from, JobState::Pending);
        assert_eq!(t.to, JobState::Running);
    }

    #[test]
    fn pending_report_never_moves_running_backwards() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        job.apply_report(SchedulerState::Running, Utc::now());
        assert!(job.apply_report(SchedulerState::Pending, Utc::now()).is_none());
        assert_eq!(job.state, JobState::Running);
    }

    #[test]
    fn terminal_failure_class_records_reason() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        job.apply_report(
            SchedulerState::Failed {
                reason: "OUT_OF_MEMORY".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(job.state, JobState::Failed);
        assert!(
            job.error_message
                .as_deref()
                .unwrap()
                .contains("OUT_OF_MEMORY")
        );
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        job.apply_report(SchedulerState::Completed, Utc::now());
        let completed_at = job.completed_at;

        // No report can move the job out of a terminal state, and the
        // completion timestamp is not rewritten.
        assert!(job.apply_report(SchedulerState::Running, Utc::now()).is_none());
        assert!(
            job.apply_report(
                SchedulerState::Failed {
                    reason: "TIMEOUT".to_string()
                },
                Utc::now()
            )
            .is_none()
        );
        assert!(job.mark_cancelled(Utc::now()).is_none());
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.completed_at, completed_at);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn duplicate_completed_reports_write_completed_at_once() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());

        let first = Utc::now();
        job.apply_report(SchedulerState::Completed, first);
        let later = first + chrono::Duration::seconds(30);
        assert!(job.apply_report(SchedulerState::Completed, later).is_none());
        assert_eq!(job.completed_at, Some(first));
    }

    #[test]
    fn cancellation_from_pending_sets_message_and_timestamp() {
        let mut job = job();
        job.mark_submitted("1".to_string(), Utc::now());
        let t = job.mark_cancelled(Utc::now()).unwrap();
        assert_eq!(t.to, JobState::Cancelled);
        assert_eq!(job.error_message.as_deref(), Some("Cancelled by user"));
        assert!(job.completed_at.is_some());

        // A late scheduler-reported terminal state is a no-op.
        assert!(
            job.apply_report(SchedulerState::Completed, Utc::now())
                .is_none()
        );
        assert_eq!(job.state, JobState::Cancelled);
    }

    #[test]
    fn submitted_at_precedes_completed_at() {
        let mut job = job();
        let submitted = Utc::now();
        job.mark_submitted("1".to_string(), submitted);
        job.apply_report(
            SchedulerState::Completed,
            submitted + chrono::Duration::seconds(120),
        );
        assert!(job.submitted_at.unwrap() <= job.completed_at.unwrap());
    }
}
