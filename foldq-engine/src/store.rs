//! Job persistence seam and per-job locking
//!
//! Submission and polling run independently and synchronize only through
//! stored job state, so every mutation of a job happens under that job's
//! lock (single-writer-per-job). The store itself is a trait so a
//! database-backed implementation can replace the in-memory one without
//! touching the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use foldq_core::domain::job::Job;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persisted job state shared by the coordinator and the reconciler.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<(), StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;
    /// Overwrites an existing job record.
    async fn save(&self, job: &Job) -> Result<(), StoreError>;
    /// Jobs the reconciler tracks: `Pending` or `Running`.
    async fn list_active(&self) -> Result<Vec<Job>, StoreError>;
    /// Jobs shown in listings: everything not soft-deleted.
    async fn list_visible(&self) -> Result<Vec<Job>, StoreError>;
}

/// In-memory store. Suitable for the simulated scheduler and for tests;
/// production deployments put a database behind the same trait.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.lock().unwrap().insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn save(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        let mut active: Vec<Job> = jobs
            .values()
            .filter(|job| job.state.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|job| job.created_at);
        Ok(active)
    }

    async fn list_visible(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        let mut visible: Vec<Job> = jobs
            .values()
            .filter(|job| !job.deleted)
            .cloned()
            .collect();
        visible.sort_by_key(|job| job.created_at);
        Ok(visible)
    }
}

/// Per-job mutex map enforcing the single-writer discipline: the
/// reconciler, the coordinator, and cancellation requests all take the
/// job's lock before reading-then-writing its state.
#[derive(Default)]
pub struct JobLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
