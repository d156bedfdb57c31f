//! Runners and the runner registry
//!
//! A `Runner` knows how to translate one computational tool's requirements
//! into an executable submission script. Script building is a pure function
//! of the job and its resource config; the only I/O permitted is checking
//! for input files already materialized under the job's workdir.
//!
//! The registry is populated once at process start and immutable afterwards,
//! so resolution is safe for concurrent readers without synchronization.

mod boltz;
mod ligandmpnn;
mod rfdiffusion;

pub use boltz::BoltzRunner;
pub use ligandmpnn::LigandMpnnRunner;
pub use rfdiffusion::RfDiffusionRunner;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use foldq_core::domain::job::Job;
use foldq_core::domain::resources::ResourceConfig;

/// Script-build failures. Fatal to the job, never to the process.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid resource config: {0}")]
    InvalidResourceConfig(String),
    #[error("invalid job inputs: {0}")]
    InvalidJobInputs(String),
}

/// Registry misuse. Indicates a configuration or integration defect, not a
/// runtime condition; callers propagate these fatally.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("runner key already registered: {0}")]
    DuplicateKey(String),
    #[error("unknown runner: {0}")]
    UnknownRunner(String),
}

/// Builds a submission script for one supported tool.
pub trait Runner: Send + Sync {
    /// Stable key jobs refer to this runner by.
    fn key(&self) -> &'static str;

    /// Human-readable tool name.
    fn name(&self) -> &'static str;

    /// Renders the submission script for `job` under `config`.
    fn build_script(&self, job: &Job, config: &ResourceConfig) -> Result<String, ScriptError>;
}

/// Maps runner keys to runner implementations.
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    pub fn register(&mut self, runner: Arc<dyn Runner>) -> Result<(), RegistryError> {
        let key = runner.key().to_string();
        if self.runners.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key));
        }
        self.runners.insert(key, runner);
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn Runner>, RegistryError> {
        self.runners
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRunner(key.to_string()))
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in runner registered.
pub fn builtin_registry() -> Result<RunnerRegistry, RegistryError> {
    let mut registry = RunnerRegistry::new();
    registry.register(Arc::new(BoltzRunner))?;
    registry.register(Arc::new(RfDiffusionRunner))?;
    registry.register(Arc::new(LigandMpnnRunner))?;
    Ok(registry)
}

// Shared script-building helpers.

pub(crate) fn param_str<'a>(job: &'a Job, key: &str) -> Option<&'a str> {
    job.params
        .get(key)
        .and_then(|value| value.as_str())
        .filter(|s| !s.is_empty())
}

pub(crate) fn param_u64(job: &Job, key: &str) -> Option<u64> {
    job.params.get(key).and_then(|value| value.as_u64())
}

pub(crate) fn param_bool(job: &Job, key: &str) -> bool {
    job.params
        .get(key)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// `#!/bin/bash` plus the `#SBATCH` block: job-scoped name and log paths,
/// then the resource directives from the config.
pub(crate) fn sbatch_header(tool: &str, job: &Job, config: &ResourceConfig) -> String {
    let outdir = job.output_dir();
    let mut header = format!(
        "#!/bin/bash\n\
         #SBATCH --job-name={tool}-{id}\n\
         #SBATCH --output={outdir}/slurm-%j.out\n\
         #SBATCH --error={outdir}/slurm-%j.err\n",
        id = job.id,
        outdir = outdir.display(),
    );
    let directives = config.slurm_directives();
    if !directives.is_empty() {
        header.push_str(&directives);
        header.push('\n');
    }
    header
}

/// `docker run` invocation with the workdir mounted at /work and the
/// config's extra env/mounts applied. GPU access is requested only when
/// the config asks for GPUs.
pub(crate) fn docker_invocation(
    job: &Job,
    config: &ResourceConfig,
    default_image: &str,
    tool_args: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if config.gpus > 0 {
        parts.push("docker run --rm --gpus all".to_string());
    } else {
        parts.push("docker run --rm".to_string());
    }
    parts.push(format!("-v {}:/work", job.workdir.display()));

    let mut env: Vec<(&String, &String)> = config.extra_env.iter().collect();
    env.sort();
    for (key, value) in env {
        parts.push(format!("-e {key}={value}"));
    }
    for mount in &config.extra_mounts {
        parts.push(format!("-v {}:{}", mount.source, mount.target));
    }
    parts.push("-e PYTHONUNBUFFERED=1".to_string());

    let image = config.image_uri.as_deref().unwrap_or(default_image);
    parts.push(image.to_string());
    parts.push(tool_args.to_string());
    parts.join(" \\\n  ")
}

/// Wraps the docker invocation in the common script body.
pub(crate) fn script_body(job: &Job, docker_cmd: &str) -> String {
    let outdir = job.output_dir();
    format!(
        "\nset -euo pipefail\n\n\
         mkdir -p {outdir}\n\n\
         {docker_cmd}\n\n\
         # Make results readable by the submitting service\n\
         chmod -R a+rX {outdir} 2>/dev/null || true\n",
        outdir = outdir.display(),
    )
}

pub(crate) fn require_input_file(job: &Job, relative: &str) -> Result<(), ScriptError> {
    let path = job.input_dir().join(relative);
    if path.is_file() {
        Ok(())
    } else {
        Err(ScriptError::InvalidJobInputs(format!(
            "expected input file {relative} under {}",
            job.input_dir().display()
        )))
    }
}

pub(crate) fn require_gpus(config: &ResourceConfig, tool: &str) -> Result<(), ScriptError> {
    if config.gpus == 0 {
        return Err(ScriptError::InvalidResourceConfig(format!(
            "{tool} requires at least one GPU"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    struct NullRunner(&'static str);

    impl Runner for NullRunner {
        fn key(&self) -> &'static str {
            self.0
        }
        fn name(&self) -> &'static str {
            self.0
        }
        fn build_script(&self, _job: &Job, _config: &ResourceConfig) -> Result<String, ScriptError> {
            Ok(String::new())
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = RunnerRegistry::new();
        registry.register(Arc::new(NullRunner("tool"))).unwrap();
        assert!(matches!(
            registry.register(Arc::new(NullRunner("tool"))),
            Err(RegistryError::DuplicateKey(key)) if key == "tool"
        ));
    }

    #[test]
    fn unknown_key_fails_resolution() {
        let registry = RunnerRegistry::new();
        assert!(matches!(
            registry.resolve("nope"),
            Err(RegistryError::UnknownRunner(key)) if key == "nope"
        ));
    }

    #[test]
    fn builtin_registry_has_all_tools() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.keys(), vec!["boltz-2", "ligandmpnn", "rfdiffusion"]);
        assert_eq!(registry.resolve("boltz-2").unwrap().name(), "Boltz-2");
    }

    #[test]
    fn header_embeds_job_scoped_names() {
        let job = Job::new("", "boltz-2", Path::new("/data/jobs"), Utc::now());
        let header = sbatch_header("boltz", &job, &ResourceConfig::default());
        assert!(header.starts_with("#!/bin/bash\n"));
        assert!(header.contains(&format!("--job-name=boltz-{}", job.id)));
        assert!(header.contains(&format!("{}/slurm-%j.out", job.output_dir().display())));
    }

    #[test]
    fn docker_invocation_respects_gpu_and_overrides() {
        let job = Job::new("", "boltz-2", Path::new("/data/jobs"), Utc::now());

        let cpu_only = ResourceConfig::default();
        let cmd = docker_invocation(&job, &cpu_only, "img:latest", "run");
        assert!(!cmd.contains("--gpus"));
        assert!(cmd.contains("img:latest"));

        let mut gpu = ResourceConfig {
            gpus: 1,
            image_uri: Some("custom:1".to_string()),
            ..Default::default()
        };
        gpu.extra_env
            .insert("MSA_KEY".to_string(), "secret".to_string());
        let cmd = docker_invocation(&job, &gpu, "img:latest", "run");
        assert!(cmd.contains("--gpus all"));
        assert!(cmd.contains("custom:1"));
        assert!(!cmd.contains("img:latest"));
        assert!(cmd.contains("-e MSA_KEY=secret"));
    }
}
