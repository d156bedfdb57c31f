//! Engine configuration
//!
//! Defines all configurable parameters for the engine including the job
//! data directory, polling cadence, command timeouts, and the simulated
//! scheduler switch.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
///
/// All timeouts and intervals are configurable to allow tuning for
/// different deployment scenarios (dev vs prod, busy vs idle clusters).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which per-job workdirs are created
    pub job_base_dir: PathBuf,

    /// How often the reconciler queries the scheduler for active jobs
    pub poll_interval: Duration,

    /// Maximum time a single scheduler command may run
    pub command_timeout: Duration,

    /// How long a submitted job may stay invisible to every query tier
    /// before it is declared lost
    pub stale_job_timeout: Duration,

    /// Run against the in-process simulated scheduler instead of a real
    /// cluster
    pub simulated_scheduler: bool,

    /// Simulated scheduler: how long a job sits in the queue
    pub sim_pending_delay: Duration,

    /// Simulated scheduler: how long a job runs before completing
    pub sim_running_delay: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - JOB_BASE_DIR (default: ./job_data)
    /// - POLL_INTERVAL (seconds, default: 10)
    /// - COMMAND_TIMEOUT (seconds, default: 30)
    /// - STALE_JOB_TIMEOUT (seconds, default: 3600)
    /// - SIMULATED_SCHEDULER (true/1 to enable, default: off)
    /// - SIM_PENDING_DELAY (seconds, default: 5)
    /// - SIM_RUNNING_DELAY (seconds, default: 10)
    pub fn from_env() -> Self {
        Self {
            job_base_dir: std::env::var("JOB_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./job_data")),
            poll_interval: env_secs("POLL_INTERVAL", 10),
            command_timeout: env_secs("COMMAND_TIMEOUT", 30),
            stale_job_timeout: env_secs("STALE_JOB_TIMEOUT", 3600),
            simulated_scheduler: std::env::var("SIMULATED_SCHEDULER")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            sim_pending_delay: env_secs("SIM_PENDING_DELAY", 5),
            sim_running_delay: env_secs("SIM_RUNNING_DELAY", 10),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.job_base_dir.as_os_str().is_empty() {
            anyhow::bail!("job_base_dir cannot be empty");
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.command_timeout.as_secs() == 0 {
            anyhow::bail!("command_timeout must be greater than 0");
        }

        if self.stale_job_timeout < self.poll_interval {
            anyhow::bail!("stale_job_timeout must be at least one poll interval");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_base_dir: PathBuf::from("./job_data"),
            poll_interval: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            stale_job_timeout: Duration::from_secs(3600),
            simulated_scheduler: false,
            sim_pending_delay: Duration::from_secs(5),
            sim_running_delay: Duration::from_secs(10),
        }
    }
}

fn env_secs(key: &str, default: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.stale_job_timeout, Duration::from_secs(3600));
        assert!(!config.simulated_scheduler);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_secs(10);
        config.stale_job_timeout = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }
}
