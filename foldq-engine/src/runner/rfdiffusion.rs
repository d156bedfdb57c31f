//! RFdiffusion backbone generation runner.
//!
//! Mode-dependent: unconditional generation needs no input structure,
//! binder design needs `input/target.pdb`, motif scaffolding and partial
//! diffusion need `input/input.pdb`.

use foldq_core::domain::job::Job;
use foldq_core::domain::resources::ResourceConfig;

use super::{
    Runner, ScriptError, docker_invocation, param_str, param_u64, require_gpus,
    require_input_file, sbatch_header, script_body,
};

const DEFAULT_IMAGE: &str = "ghcr.io/foldq/rfdiffusion:1.1.0";

pub struct RfDiffusionRunner;

impl Runner for RfDiffusionRunner {
    fn key(&self) -> &'static str {
        "rfdiffusion"
    }

    fn name(&self) -> &'static str {
        "RFdiffusion"
    }

    fn build_script(&self, job: &Job, config: &ResourceConfig) -> Result<String, ScriptError> {
        require_gpus(config, "RFdiffusion")?;

        let mode = param_str(job, "mode").unwrap_or("unconditional");
        let num_designs = param_u64(job, "num_designs").unwrap_or(10);
        let timesteps = param_u64(job, "timesteps").unwrap_or(50);

        let mut overrides = vec![
            "inference.output_prefix=/work/output/design".to_string(),
            "inference.model_directory_path=/app/RFdiffusion/models".to_string(),
            format!("inference.num_designs={num_designs}"),
            format!("diffuser.T={timesteps}"),
        ];

        match mode {
            "binder" => {
                require_input_file(job, "target.pdb")?;
                overrides.push("inference.input_pdb=/work/input/target.pdb".to_string());
            }
            "motif" | "partial" => {
                require_input_file(job, "input.pdb")?;
                overrides.push("inference.input_pdb=/work/input/input.pdb".to_string());
            }
            _ => {}
        }

        // Contig strings carry brackets; single-quote them against the shell.
        if let Some(contigs) = param_str(job, "contigs") {
            overrides.push(format!("'contigmap.contigs={contigs}'"));
        }
        if let Some(hotspot) = param_str(job, "hotspot_residues") {
            let hotspot = hotspot.trim();
            let bracketed = if hotspot.starts_with('[') {
                hotspot.to_string()
            } else {
                format!("[{hotspot}]")
            };
            overrides.push(format!("'ppi.hotspot_res={bracketed}'"));
        }
        if mode == "partial" {
            let partial_t = param_u64(job, "partial_T").unwrap_or(10);
            overrides.push(format!("diffuser.partial_T={partial_t}"));
        }

        let mut config_name = "base";
        if mode == "symmetric" {
            config_name = "symmetry";
            let sym_type = param_str(job, "symmetry_type").unwrap_or("cyclic");
            let sym_order = param_u64(job, "symmetry_order").unwrap_or(3);
            overrides.push(format!("inference.symmetry={sym_type}"));
            overrides.push(format!("inference.symmetry_order={sym_order}"));
        }

        let tool_args = format!(
            "--config-name {config_name} \\\n    {}",
            overrides.join(" \\\n    ")
        );

        let docker_cmd = docker_invocation(job, config, DEFAULT_IMAGE, &tool_args);
        Ok(format!(
            "{}{}",
            sbatch_header("rfdiffusion", job, config),
            script_body(job, &docker_cmd)
        ))
    }
}
