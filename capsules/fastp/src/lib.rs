//! fastp read trimming inside a container image.
//!
//! Every invocation applies the same compiled-in trimming policy, see
//! [`POLICY_FLAGS`]. Changing the policy means building a new wrapper.

use capsules_container_exec::{bind_mounts, ContainerInvocation, EnvironmentActivation};
pub use capsules_container_exec::DEFAULT_CONDA_HOME;
use invocation::{validate_image, validate_inputs, CompletionSummary, PathMapping, WrapperError};
use std::path::{Path, PathBuf};
use tracing::info;

pub const TOOL: &str = "fastp";
pub const CONDA_ENV: &str = "fastp";

/// Adapter detection for paired-end input, sliding-window quality trimming
/// from both ends, minimum post-trim length, poly-G and poly-X trimming.
pub const POLICY_FLAGS: &[&str] = &[
    "--detect_adapter_for_pe",
    "--cut_front",
    "--cut_tail",
    "--cut_window_size",
    "4",
    "--cut_mean_quality",
    "20",
    "--length_required",
    "50",
    "--trim_poly_g",
    "--trim_poly_x",
];

/// Parsed, immutable parameters of one fastp run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastpRequest {
    pub container: String,
    pub metagenome_id: String,
    pub num_threads: u32,
    pub input_read1: PathBuf,
    pub input_read2: PathBuf,
    pub output_trimmed_r1: PathBuf,
    pub output_trimmed_r2: PathBuf,
    pub output_json: PathBuf,
    pub output_html: PathBuf,
    pub output_unpaired1: Option<PathBuf>,
    pub output_unpaired2: Option<PathBuf>,
    pub output_merged: Option<PathBuf>,
    pub output_failed: Option<PathBuf>,
    pub conda_home: PathBuf,
}

impl FastpRequest {
    pub fn inputs(&self) -> [&Path; 2] {
        [self.input_read1.as_path(), self.input_read2.as_path()]
    }

    /// All outputs, trimmed R1 first since it decides the output mount root.
    pub fn outputs(&self) -> Vec<&Path> {
        let mut outputs = vec![
            self.output_trimmed_r1.as_path(),
            self.output_trimmed_r2.as_path(),
            self.output_json.as_path(),
            self.output_html.as_path(),
        ];
        outputs.extend(
            [
                &self.output_unpaired1,
                &self.output_unpaired2,
                &self.output_merged,
                &self.output_failed,
            ]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path),
        );
        outputs
    }
}

pub fn validate(request: &FastpRequest) -> Result<(), WrapperError> {
    validate_image(&request.container)?;
    validate_inputs(request.inputs())
}

pub fn resolve_paths(request: &FastpRequest) -> Result<PathMapping, WrapperError> {
    PathMapping::resolve(&request.inputs(), &request.outputs())
}

/// fastp argument list, deterministic in `request` and `mapping`.
pub fn build_command(request: &FastpRequest, mapping: &PathMapping) -> Vec<String> {
    let mut cmd = vec![TOOL.to_string()];
    cmd.extend(["--in1".to_string(), mapping.container_input(&request.input_read1)]);
    cmd.extend(["--in2".to_string(), mapping.container_input(&request.input_read2)]);
    cmd.extend(["--out1".to_string(), mapping.container_output(&request.output_trimmed_r1)]);
    cmd.extend(["--out2".to_string(), mapping.container_output(&request.output_trimmed_r2)]);

    if let Some(path) = &request.output_unpaired1 {
        cmd.extend(["--unpaired1".to_string(), mapping.container_output(path)]);
    }
    if let Some(path) = &request.output_unpaired2 {
        cmd.extend(["--unpaired2".to_string(), mapping.container_output(path)]);
    }
    if let Some(path) = &request.output_merged {
        cmd.push("--merge".to_string());
        cmd.extend(["--merged_out".to_string(), mapping.container_output(path)]);
    }
    if let Some(path) = &request.output_failed {
        cmd.extend(["--failed_out".to_string(), mapping.container_output(path)]);
    }

    cmd.extend(["--json".to_string(), mapping.container_output(&request.output_json)]);
    cmd.extend(["--html".to_string(), mapping.container_output(&request.output_html)]);
    cmd.extend(["--thread".to_string(), request.num_threads.to_string()]);
    cmd.extend(POLICY_FLAGS.iter().map(|flag| flag.to_string()));
    cmd
}

pub fn build_invocation(request: &FastpRequest, mapping: &PathMapping) -> ContainerInvocation {
    ContainerInvocation {
        tool: TOOL.to_string(),
        image: request.container.clone(),
        mounts: bind_mounts(mapping),
        activation: EnvironmentActivation::new(&request.conda_home, CONDA_ENV),
        command: build_command(request, mapping),
    }
}

pub fn summary(request: &FastpRequest) -> CompletionSummary {
    CompletionSummary::new(TOOL, &request.metagenome_id)
        .with_output("trimmedR1", &request.output_trimmed_r1)
        .with_output("trimmedR2", &request.output_trimmed_r2)
        .with_optional_output("unpaired1", request.output_unpaired1.as_deref())
        .with_optional_output("unpaired2", request.output_unpaired2.as_deref())
        .with_optional_output("merged", request.output_merged.as_deref())
        .with_optional_output("failed", request.output_failed.as_deref())
        .with_report("json", &request.output_json)
        .with_report("html", &request.output_html)
}

/// Validate, resolve, build, execute and check one run. Stops at the first failing stage.
pub fn run(request: &FastpRequest) -> Result<CompletionSummary, WrapperError> {
    info!(metagenome_id = %request.metagenome_id, "starting fastp wrapper");
    validate(request)?;
    let mapping = resolve_paths(request)?;
    let invocation = build_invocation(request, &mapping);
    let result = capsules_container_exec::execute(&invocation)?;
    result.check(&invocation)?;
    info!(metagenome_id = %request.metagenome_id, "fastp completed");
    Ok(summary(request))
}
