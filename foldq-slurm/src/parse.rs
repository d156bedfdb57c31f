//! SLURM output parsing
//!
//! Pure functions over the textual output of the scheduler tools. Kept
//! separate from command invocation so every format quirk has a test.

use foldq_core::scheduler::SchedulerState;

/// Extracts the job id from sbatch output ("Submitted batch job 12345").
pub fn parse_submit_output(stdout: &str) -> Option<String> {
    let marker = "Submitted batch job";
    let idx = stdout.find(marker)?;
    let id = stdout[idx + marker.len()..]
        .split_whitespace()
        .next()?
        .to_string();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id)
    } else {
        None
    }
}

/// First non-empty line of a command's stdout.
pub fn first_nonempty_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Normalizes a raw state token: first whitespace-separated word
/// ("CANCELLED by 1001" -> "CANCELLED"), `+` suffix stripped
/// ("CANCELLED+" -> "CANCELLED").
pub fn normalize_state_token(raw: &str) -> &str {
    let token = raw.split_whitespace().next().unwrap_or("");
    token.split('+').next().unwrap_or("")
}

/// Maps a squeue `%T` state for a job still known to the queue.
///
/// Any unrecognized live state is treated as running: the job occupies the
/// queue, so it is certainly not terminal.
pub fn active_state(raw: &str) -> SchedulerState {
    match normalize_state_token(raw) {
        "PENDING" | "CONFIGURING" => SchedulerState::Pending,
        "RUNNING" | "COMPLETING" | "SUSPENDED" => SchedulerState::Running,
        _ => SchedulerState::Running,
    }
}

/// Maps an accounting-side state token (sacct `State`, scontrol
/// `JobState`). Unknown terminal tokens collapse to a failure carrying the
/// raw token so the cause survives into the job's error message.
pub fn accounting_state(raw: &str) -> SchedulerState {
    let token = normalize_state_token(raw);
    match token {
        "COMPLETED" => SchedulerState::Completed,
        "PENDING" | "CONFIGURING" => SchedulerState::Pending,
        "RUNNING" | "COMPLETING" | "SUSPENDED" => SchedulerState::Running,
        _ => SchedulerState::Failed {
            reason: token.to_string(),
        },
    }
}

/// Finds `key=value` in one-line `scontrol show job -o` output.
pub fn parse_scontrol_field(output: &str, key: &str) -> Option<String> {
    for token in output.split_whitespace() {
        if let Some(eq) = token.find('=') {
            let (k, v) = token.split_at(eq);
            if k == key {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sbatch_job_id() {
        assert_eq!(
            parse_submit_output("Submitted batch job 98123\n"),
            Some("98123".to_string())
        );
    }

    #[test]
    fn rejects_garbage_sbatch_output() {
        assert_eq!(parse_submit_output("sbatch: error: invalid partition"), None);
        assert_eq!(parse_submit_output("Submitted batch job abc"), None);
        assert_eq!(parse_submit_output(""), None);
    }

    #[test]
    fn squeue_states_map_to_pending_or_running() {
        assert_eq!(active_state("PENDING"), SchedulerState::Pending);
        assert_eq!(active_state("CONFIGURING"), SchedulerState::Pending);
        assert_eq!(active_state("RUNNING"), SchedulerState::Running);
        assert_eq!(active_state("COMPLETING"), SchedulerState::Running);
        assert_eq!(active_state("SUSPENDED"), SchedulerState::Running);
        // Unknown live state still occupies the queue.
        assert_eq!(active_state("REQUEUED"), SchedulerState::Running);
    }

    #[test]
    fn accounting_success_and_failure_classes() {
        assert_eq!(accounting_state("COMPLETED"), SchedulerState::Completed);
        for failure in [
            "CANCELLED",
            "FAILED",
            "TIMEOUT",
            "NODE_FAIL",
            "OUT_OF_MEMORY",
            "PREEMPTED",
        ] {
            match accounting_state(failure) {
                SchedulerState::Failed { reason } => assert_eq!(reason, failure),
                other => panic!("{failure} mapped to {other:?}"),
            }
        }
    }

    #[test]
    fn cancelled_plus_suffix_is_stripped() {
        assert_eq!(
            accounting_state("CANCELLED+"),
            SchedulerState::Failed {
                reason: "CANCELLED".to_string()
            }
        );
        assert_eq!(
            accounting_state("CANCELLED by 1001"),
            SchedulerState::Failed {
                reason: "CANCELLED".to_string()
            }
        );
    }

    #[test]
    fn sacct_output_uses_first_nonempty_line() {
        // sacct without -X can emit step lines; callers take the first.
        let out = "\n  CANCELLED+ \n COMPLETED \n";
        assert_eq!(first_nonempty_line(out), Some("CANCELLED+"));
    }

    #[test]
    fn scontrol_field_lookup() {
        let out = "JobId=77 JobName=boltz-abc JobState=RUNNING Reason=None NodeList=gpu01";
        assert_eq!(
            parse_scontrol_field(out, "JobState"),
            Some("RUNNING".to_string())
        );
        assert_eq!(parse_scontrol_field(out, "Partition"), None);
    }
}
