//! Submission coordinator
//!
//! Orchestrates create -> build-script -> submit with compensating
//! transitions: any script-build or submission failure moves the job
//! straight to `Failed` with the cause recorded, and nothing retries
//! automatically. Submission is invoked at most once per job; a second
//! attempt fails fast.
//!
//! Cancellation is handled here, out-of-band from the reconciler: the
//! external cancel is issued best-effort and the local `Cancelled` state
//! is applied regardless of its outcome.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use foldq_core::clock::Clock;
use foldq_core::domain::job::Job;
use foldq_core::domain::resources::ResourceConfig;
use foldq_core::scheduler::{SchedulerClient, SchedulerError};

use crate::runner::{RegistryError, RunnerRegistry, ScriptError};
use crate::store::{JobLocks, JobStore, StoreError};

/// Supplies the resource configuration for a runner key. Owned by an
/// external configuration store; the engine only reads it at
/// script-build time (never cached on the job).
pub trait ResourceConfigSource: Send + Sync {
    fn get(&self, runner_key: &str) -> ResourceConfig;
}

/// Fixed config map with a default fallback, for the daemon and tests.
#[derive(Default)]
pub struct StaticConfigSource {
    configs: HashMap<String, ResourceConfig>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, runner_key: impl Into<String>, config: ResourceConfig) -> Self {
        self.configs.insert(runner_key.into(), config);
        self
    }
}

impl ResourceConfigSource for StaticConfigSource {
    fn get(&self, runner_key: &str) -> ResourceConfig {
        self.configs.get(runner_key).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    /// Programming error: submission is not idempotent and must be
    /// invoked at most once per job.
    #[error("job {0} was already submitted")]
    AlreadySubmitted(Uuid),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SubmissionCoordinator {
    store: Arc<dyn JobStore>,
    locks: Arc<JobLocks>,
    registry: Arc<RunnerRegistry>,
    configs: Arc<dyn ResourceConfigSource>,
    scheduler: Arc<dyn SchedulerClient>,
    clock: Arc<dyn Clock>,
    base_dir: PathBuf,
}

impl SubmissionCoordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: Arc<JobLocks>,
        registry: Arc<RunnerRegistry>,
        configs: Arc<dyn ResourceConfigSource>,
        scheduler: Arc<dyn SchedulerClient>,
        clock: Arc<dyn Clock>,
        base_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            locks,
            registry,
            configs,
            scheduler,
            clock,
            base_dir,
        }
    }

    /// Creates a job in `Created` state. Inputs must be materialized under
    /// the returned job's `input/` directory before `submit_job`.
    pub async fn create_job(
        &self,
        name: &str,
        runner_key: &str,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Job, SubmitError> {
        // Resolve up front so an unknown key fails before anything persists.
        self.registry.resolve(runner_key)?;

        let mut job = Job::new(name, runner_key, &self.base_dir, self.clock.now());
        job.params = params;
        self.store.insert(job.clone()).await?;
        info!("job {} created (runner {})", job.id, job.runner_key);
        Ok(job)
    }

    /// Builds the script and submits the job. `Created` -> `Pending` on
    /// success; `Created` -> `Failed` with the cause on any failure.
    pub async fn submit_job(&self, job_id: Uuid) -> Result<Job, SubmitError> {
        let _guard = self.locks.acquire(job_id).await;

        let mut job = self
            .store
            .get(job_id)
            .await?
            .ok_or(SubmitError::NotFound(job_id))?;

        if job.state != foldq_core::domain::job::JobState::Created || job.external_id.is_some() {
            return Err(SubmitError::AlreadySubmitted(job_id));
        }

        let runner = self.registry.resolve(&job.runner_key)?;
        let config = self.configs.get(&job.runner_key);

        let script = match runner.build_script(&job, &config) {
            Ok(script) => script,
            Err(err) => {
                self.fail_job(&mut job, err.to_string()).await?;
                return Err(err.into());
            }
        };

        match self.scheduler.submit(&job, &script).await {
            Ok(external_id) => {
                job.mark_submitted(external_id, self.clock.now());
                self.store.save(&job).await?;
                info!(
                    "job {} submitted as {} (runner {})",
                    job.id,
                    job.external_id.as_deref().unwrap_or("?"),
                    job.runner_key
                );
                Ok(job)
            }
            Err(err) => {
                self.fail_job(&mut job, err.to_string()).await?;
                Err(err.into())
            }
        }
    }

    /// Cancels a job: best-effort external cancel, then local `Cancelled`.
    /// Sticky local intent wins; a terminal job is left untouched.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Job, SubmitError> {
        let _guard = self.locks.acquire(job_id).await;

        let mut job = self
            .store
            .get(job_id)
            .await?
            .ok_or(SubmitError::NotFound(job_id))?;

        if job.state.is_terminal() {
            return Ok(job);
        }

        if let Some(external_id) = job.external_id.clone() {
            // Fire-and-forget with respect to the outcome: the local
            // transition does not depend on the external call succeeding.
            if let Err(err) = self.scheduler.cancel(&external_id).await {
                warn!("external cancel of job {} failed: {err}", job.id);
            }
        }

        if let Some(transition) = job.mark_cancelled(self.clock.now()) {
            self.store.save(&job).await?;
            info!("job {}: {} -> {}", job.id, transition.from, transition.to);
        }
        Ok(job)
    }

    async fn fail_job(&self, job: &mut Job, cause: String) -> Result<(), StoreError> {
        warn!("job {} failed before submission: {cause}", job.id);
        job.mark_submit_failed(cause, self.clock.now());
        self.store.save(job).await
    }
}
