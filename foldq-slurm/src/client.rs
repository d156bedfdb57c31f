//! Real scheduler client
//!
//! Wraps the five external scheduler commands. Submission writes the script
//! into the job's workdir and parses the returned id; status lookups go
//! through the tiered query; cancellation is best-effort.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use foldq_core::domain::job::Job;
use foldq_core::scheduler::{
    QueryError, QueryResult, SchedulerClient, SchedulerError, TieredQuery,
};

use crate::command::CommandRunner;
use crate::parse;
use crate::query::{AccountingQuery, ActiveQueueQuery, ControlDaemonQuery};

/// Names of the external scheduler commands. Overridable so deployments
/// can point at wrappers or site-specific paths.
#[derive(Debug, Clone)]
pub struct SlurmCommands {
    pub sbatch: String,
    pub squeue: String,
    pub sacct: String,
    pub scontrol: String,
    pub scancel: String,
}

impl Default for SlurmCommands {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            squeue: "squeue".to_string(),
            sacct: "sacct".to_string(),
            scontrol: "scontrol".to_string(),
            scancel: "scancel".to_string(),
        }
    }
}

/// Scheduler client backed by the real cluster tools.
pub struct SlurmClient {
    commands: SlurmCommands,
    runner: CommandRunner,
    query: TieredQuery,
}

impl SlurmClient {
    pub fn new(commands: SlurmCommands, command_timeout: Duration) -> Self {
        let runner = CommandRunner::new(command_timeout);
        let query = TieredQuery::new(vec![
            Arc::new(ActiveQueueQuery::new(commands.squeue.clone(), runner.clone())),
            Arc::new(AccountingQuery::new(commands.sacct.clone(), runner.clone())),
            Arc::new(ControlDaemonQuery::new(
                commands.scontrol.clone(),
                runner.clone(),
            )),
        ]);
        Self {
            commands,
            runner,
            query,
        }
    }

    async fn write_script(&self, workdir: &Path, script: &str) -> Result<std::path::PathBuf, SchedulerError> {
        tokio::fs::create_dir_all(workdir).await.map_err(|e| {
            SchedulerError::Submission(format!(
                "could not create workdir {}: {e}",
                workdir.display()
            ))
        })?;
        let script_path = workdir.join("job.sbatch");
        tokio::fs::write(&script_path, script).await.map_err(|e| {
            SchedulerError::Submission(format!(
                "could not write {}: {e}",
                script_path.display()
            ))
        })?;
        Ok(script_path)
    }
}

#[async_trait]
impl SchedulerClient for SlurmClient {
    async fn submit(&self, job: &Job, script: &str) -> Result<String, SchedulerError> {
        let script_path = self.write_script(&job.workdir, script).await?;
        let path_arg = script_path.to_string_lossy();

        let out = self
            .runner
            .run(&self.commands.sbatch, &[path_arg.as_ref()], Some(&job.workdir))
            .await
            .map_err(|e| SchedulerError::Submission(e.to_string()))?;

        if !out.success {
            let detail = if out.stderr.trim().is_empty() {
                out.stdout.trim().to_string()
            } else {
                out.stderr.trim().to_string()
            };
            return Err(SchedulerError::Submission(format!(
                "sbatch failed (rc={}): {detail}",
                out.exit_code
            )));
        }

        match parse::parse_submit_output(&out.stdout) {
            Some(id) => {
                debug!("job {} submitted as scheduler job {id}", job.id);
                Ok(id)
            }
            None => Err(SchedulerError::Submission(format!(
                "could not parse sbatch output: {}",
                out.stdout.trim()
            ))),
        }
    }

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        self.query.query(external_id).await
    }

    async fn cancel(&self, external_id: &str) -> Result<(), SchedulerError> {
        let out = self
            .runner
            .run(&self.commands.scancel, &[external_id], None)
            .await
            .map_err(|e| SchedulerError::Cancel(e.to_string()))?;

        // A non-zero exit usually means the job already left the queue;
        // cancellation is best-effort either way.
        if !out.success {
            warn!(
                "scancel {external_id} exited with {} ({})",
                out.exit_code,
                out.stderr.trim()
            );
        }
        Ok(())
    }
}
