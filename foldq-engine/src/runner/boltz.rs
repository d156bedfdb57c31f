//! Boltz-2 structure prediction runner.

use foldq_core::domain::job::Job;
use foldq_core::domain::resources::ResourceConfig;

use super::{
    Runner, ScriptError, docker_invocation, param_bool, param_str, param_u64, require_gpus,
    require_input_file, sbatch_header, script_body,
};

const DEFAULT_IMAGE: &str = "ghcr.io/foldq/boltz:2.2.0";

pub struct BoltzRunner;

impl Runner for BoltzRunner {
    fn key(&self) -> &'static str {
        "boltz-2"
    }

    fn name(&self) -> &'static str {
        "Boltz-2"
    }

    fn build_script(&self, job: &Job, config: &ResourceConfig) -> Result<String, ScriptError> {
        require_gpus(config, "Boltz-2")?;
        require_input_file(job, "sequences.fasta")?;

        let mut flags: Vec<String> = Vec::new();
        if param_bool(job, "use_msa_server") {
            flags.push("--use_msa_server".to_string());
        }
        if param_bool(job, "use_potentials") {
            flags.push("--use_potentials".to_string());
        }
        if let Some(format) = param_str(job, "output_format") {
            flags.push(format!("--output_format {format}"));
        }
        if let Some(steps) = param_u64(job, "recycling_steps") {
            flags.push(format!("--recycling_steps {steps}"));
        }
        if let Some(steps) = param_u64(job, "sampling_steps") {
            flags.push(format!("--sampling_steps {steps}"));
        }
        if let Some(samples) = param_u64(job, "diffusion_samples") {
            flags.push(format!("--diffusion_samples {samples}"));
        }

        let mut tool_args =
            "predict /work/input/sequences.fasta --out_dir /work/output".to_string();
        for flag in &flags {
            tool_args.push(' ');
            tool_args.push_str(flag);
        }

        let docker_cmd = docker_invocation(job, config, DEFAULT_IMAGE, &tool_args);
        Ok(format!(
            "{}{}",
            sbatch_header("boltz", job, config),
            script_body(job, &docker_cmd)
        ))
    }
}
