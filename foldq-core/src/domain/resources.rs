//! Per-runner resource configuration
//!
//! Supplied by an external configuration store and read-only to the engine;
//! runners consume it at script-build time to emit scheduler directives and
//! container settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An additional bind mount for the tool container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub source: String,
    pub target: String,
}

/// Resource and container configuration for one runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// If false, callers must not submit new jobs with this runner.
    /// Checked by the submission surface, not by the engine.
    pub enabled: bool,
    pub disabled_reason: Option<String>,

    /// Scheduler partition. `None` means the cluster default.
    pub partition: Option<String>,
    /// GPU count. Zero means no GPU request.
    pub gpus: u32,
    /// CPUs per task.
    pub cpus: u32,
    /// Memory in GB.
    pub mem_gb: u32,
    /// Wall-clock limit, e.g. "02:00:00". `None` means the cluster default.
    pub time_limit: Option<String>,

    /// Container image override. `None` means the runner's default image.
    pub image_uri: Option<String>,
    pub extra_env: HashMap<String, String>,
    pub extra_mounts: Vec<MountSpec>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_reason: None,
            partition: None,
            gpus: 0,
            cpus: 1,
            mem_gb: 8,
            time_limit: None,
            image_uri: None,
            extra_env: HashMap::new(),
            extra_mounts: Vec::new(),
        }
    }
}

impl ResourceConfig {
    /// Renders `#SBATCH` directive lines, one per non-default field.
    pub fn slurm_directives(&self) -> String {
        let mut lines = Vec::new();
        if let Some(partition) = &self.partition {
            lines.push(format!("#SBATCH --partition={partition}"));
        }
        if self.gpus > 0 {
            lines.push(format!("#SBATCH --gres=gpu:{}", self.gpus));
        }
        if self.cpus > 1 {
            lines.push(format!("#SBATCH --cpus-per-task={}", self.cpus));
        }
        if self.mem_gb > 0 {
            lines.push(format!("#SBATCH --mem={}G", self.mem_gb));
        }
        if let Some(limit) = &self.time_limit {
            lines.push(format!("#SBATCH --time={limit}"));
        }
        lines.join("\n")
    }
}
