//! Status query tiers
//!
//! Three concrete `StatusQuery` implementations, consulted in fixed order
//! by the client's `TieredQuery`:
//!
//! 1. `ActiveQueueQuery` (`squeue`) — jobs still queued or running
//! 2. `AccountingQuery` (`sacct`) — historical accounting, authoritative
//!    for finished jobs when an accounting backend is configured
//! 3. `ControlDaemonQuery` (`scontrol show job`) — the control daemon keeps
//!    finished jobs visible only briefly, so this is a last-chance source
//!    with weaker guarantees
//!
//! Each tier distinguishes "no record" (`NotFound`, fall through) from a
//! hard invocation failure (`QueryError`, transient).

use async_trait::async_trait;

use foldq_core::scheduler::{QueryError, QueryResult, StatusQuery};

use crate::command::{CommandError, CommandRunner};
use crate::parse;

impl From<CommandError> for QueryError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Timeout { timeout, .. } => QueryError::Timeout(timeout),
            CommandError::Spawn { .. } => QueryError::Invocation(err.to_string()),
        }
    }
}

/// Tier 1: the live queue.
pub struct ActiveQueueQuery {
    command: String,
    runner: CommandRunner,
}

impl ActiveQueueQuery {
    pub fn new(command: String, runner: CommandRunner) -> Self {
        Self { command, runner }
    }
}

#[async_trait]
impl StatusQuery for ActiveQueueQuery {
    fn tier(&self) -> &'static str {
        "squeue"
    }

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        let out = self
            .runner
            .run(&self.command, &["-j", external_id, "-h", "-o", "%T"], None)
            .await?;

        // squeue exits non-zero for ids it no longer knows; that is the
        // normal "left the queue" case, not a failure.
        if !out.success {
            return Ok(QueryResult::NotFound);
        }
        match parse::first_nonempty_line(&out.stdout) {
            Some(token) => Ok(QueryResult::State(parse::active_state(token))),
            None => Ok(QueryResult::NotFound),
        }
    }
}

/// Tier 2: historical accounting.
pub struct AccountingQuery {
    command: String,
    runner: CommandRunner,
}

impl AccountingQuery {
    pub fn new(command: String, runner: CommandRunner) -> Self {
        Self { command, runner }
    }
}

#[async_trait]
impl StatusQuery for AccountingQuery {
    fn tier(&self) -> &'static str {
        "sacct"
    }

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        let out = self
            .runner
            .run(
                &self.command,
                &["-j", external_id, "-n", "-o", "State", "-X"],
                None,
            )
            .await?;

        // Sites without an accounting backend get a non-zero exit here;
        // treat it as "no record" and let the next tier decide.
        if !out.success {
            return Ok(QueryResult::NotFound);
        }
        match parse::first_nonempty_line(&out.stdout) {
            Some(token) => Ok(QueryResult::State(parse::accounting_state(token))),
            None => Ok(QueryResult::NotFound),
        }
    }
}

/// Tier 3: the control daemon's short-lived job records.
pub struct ControlDaemonQuery {
    command: String,
    runner: CommandRunner,
}

impl ControlDaemonQuery {
    pub fn new(command: String, runner: CommandRunner) -> Self {
        Self { command, runner }
    }
}

#[async_trait]
impl StatusQuery for ControlDaemonQuery {
    fn tier(&self) -> &'static str {
        "scontrol"
    }

    async fn query(&self, external_id: &str) -> Result<QueryResult, QueryError> {
        let out = self
            .runner
            .run(&self.command, &["show", "job", external_id, "-o"], None)
            .await?;

        // scontrol reports "Invalid job id specified" once the record has
        // aged out (MinJobAge). That exhausts this tier.
        if !out.success {
            return Ok(QueryResult::NotFound);
        }
        match parse::parse_scontrol_field(&out.stdout, "JobState") {
            Some(token) => Ok(QueryResult::State(parse::accounting_state(&token))),
            None => Ok(QueryResult::NotFound),
        }
    }
}
