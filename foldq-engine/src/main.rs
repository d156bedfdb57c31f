//! foldq engine daemon
//!
//! Reconciliation process for batch jobs: polls the scheduler for every
//! active job and applies state transitions to the job store. Submission
//! and cancellation go through [`foldq_engine::coordinator`], which the
//! embedding application drives; this binary owns the polling side.
//!
//! Set SIMULATED_SCHEDULER=1 to run against the in-process fake scheduler
//! instead of a real cluster; in that mode a sample job is submitted at
//! startup so the full lifecycle is observable in the logs.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foldq_core::clock::{Clock, SystemClock};
use foldq_core::scheduler::SchedulerClient;
use foldq_engine::config::Config;
use foldq_engine::coordinator::{StaticConfigSource, SubmissionCoordinator};
use foldq_engine::reconciler::PollingReconciler;
use foldq_engine::runner::builtin_registry;
use foldq_engine::store::{JobLocks, MemoryJobStore};
use foldq_slurm::{SimulatedScheduler, SlurmClient, SlurmCommands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foldq_engine=info,foldq_slurm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting foldq engine");

    let config = Config::from_env();
    config.validate()?;
    info!(
        "Loaded configuration: base_dir={}, poll_interval={:?}, simulated={}",
        config.job_base_dir.display(),
        config.poll_interval,
        config.simulated_scheduler
    );

    tokio::fs::create_dir_all(&config.job_base_dir)
        .await
        .context("Failed to create job base directory")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let scheduler: Arc<dyn SchedulerClient> = if config.simulated_scheduler {
        info!(
            "Using simulated scheduler (pending {:?}, running {:?})",
            config.sim_pending_delay, config.sim_running_delay
        );
        Arc::new(SimulatedScheduler::with_delays(
            clock.clone(),
            config.sim_pending_delay,
            config.sim_running_delay,
        ))
    } else {
        Arc::new(SlurmClient::new(
            SlurmCommands::default(),
            config.command_timeout,
        ))
    };

    let registry = Arc::new(builtin_registry().context("Failed to build runner registry")?);
    info!("Registered runners: {}", registry.keys().join(", "));

    let store = Arc::new(MemoryJobStore::new());
    let locks = Arc::new(JobLocks::new());

    let coordinator = Arc::new(SubmissionCoordinator::new(
        store.clone(),
        locks.clone(),
        registry,
        Arc::new(StaticConfigSource::new()),
        scheduler.clone(),
        clock.clone(),
        config.job_base_dir.clone(),
    ));

    if config.simulated_scheduler {
        tokio::spawn(async move {
            if let Err(err) = submit_sample_job(&coordinator).await {
                error!("Sample job submission failed: {err:#}");
            }
        });
    }

    let reconciler = PollingReconciler::new(store, locks, scheduler, clock)
        .with_stale_after(config.stale_job_timeout);

    info!("Engine initialized, entering polling loop");
    reconciler.run(config.poll_interval).await;

    Ok(())
}

/// Pushes one CPU-only job through the simulated scheduler so the whole
/// submit -> poll -> complete cycle shows up in the logs.
async fn submit_sample_job(coordinator: &SubmissionCoordinator) -> Result<()> {
    let job = coordinator
        .create_job("sample", "ligandmpnn", serde_json::Map::new())
        .await?;
    tokio::fs::create_dir_all(job.input_dir()).await?;
    tokio::fs::write(
        job.input_dir().join("input.pdb"),
        "REMARK sample structure\nEND\n",
    )
    .await?;
    let job = coordinator.submit_job(job.id).await?;
    info!(
        "Sample job {} submitted as {}",
        job.id,
        job.external_id.as_deref().unwrap_or("?")
    );
    Ok(())
}
