//! LigandMPNN / ProteinMPNN sequence design runner.
//!
//! Runs fine on CPU, so this runner accepts a zero-GPU config.

use foldq_core::domain::job::Job;
use foldq_core::domain::resources::ResourceConfig;

use super::{
    Runner, ScriptError, docker_invocation, param_str, param_u64, require_input_file,
    sbatch_header, script_body,
};

const DEFAULT_IMAGE: &str = "ghcr.io/foldq/ligandmpnn:0.3.0";

pub struct LigandMpnnRunner;

impl Runner for LigandMpnnRunner {
    fn key(&self) -> &'static str {
        "ligandmpnn"
    }

    fn name(&self) -> &'static str {
        "LigandMPNN"
    }

    fn build_script(&self, job: &Job, config: &ResourceConfig) -> Result<String, ScriptError> {
        require_input_file(job, "input.pdb")?;

        let variant = param_str(job, "model_variant").unwrap_or("protein_mpnn");
        let noise = param_str(job, "noise_level").unwrap_or("010");
        let checkpoint = if variant == "protein_mpnn" {
            format!("--checkpoint_protein_mpnn /app/model_params/proteinmpnn_{noise}.pt")
        } else {
            format!("--checkpoint_ligand_mpnn /app/model_params/ligandmpnn_{noise}.pt")
        };

        let mut flags = vec![format!("--model_type {variant}"), checkpoint];
        if let Some(temperature) = param_str(job, "temperature") {
            flags.push(format!("--sampling_temp \"{temperature}\""));
        }
        if let Some(count) = param_u64(job, "num_sequences") {
            flags.push(format!("--number_of_batches {count}"));
        }
        if let Some(seed) = param_u64(job, "seed") {
            flags.push(format!("--seed {seed}"));
        }
        if let Some(chains) = param_str(job, "chains_to_design") {
            flags.push(format!("--chains_to_design \"{chains}\""));
        }
        if let Some(fixed) = param_str(job, "fixed_residues") {
            flags.push(format!("--fixed_positions \"{fixed}\""));
        }

        let tool_args = format!(
            "--pdb_path /work/input/input.pdb \\\n    --out_folder /work/output \\\n    {}",
            flags.join(" \\\n    ")
        );

        let docker_cmd = docker_invocation(job, config, DEFAULT_IMAGE, &tool_args);
        Ok(format!(
            "{}{}",
            sbatch_header("ligandmpnn", job, config),
            script_body(job, &docker_cmd)
        ))
    }
}
