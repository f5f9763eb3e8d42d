//! Bowtie2 index construction for an assembly inside a container image.

use capsules_container_exec::{bind_mounts, ContainerInvocation, EnvironmentActivation};
pub use capsules_container_exec::DEFAULT_CONDA_HOME;
use invocation::{
    validate_image, validate_inputs, CompletionSummary, PathMapping, WrapperError,
    CONTAINER_OUTPUT_ROOT,
};
use std::path::PathBuf;
use tracing::info;

pub const TOOL: &str = "bowtie2-build";
pub const CONDA_ENV: &str = "bowtie2";
const INDEX_SUFFIX: &str = "_bowtie2_index";

/// Basename shared by every file of the index built for `name`.
pub fn index_basename(name: &str) -> String {
    format!("{name}{INDEX_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRequest {
    pub container: String,
    pub assembly: PathBuf,
    /// Usually the assembly id. Must be a plain name, not a path.
    pub output_name: String,
    pub output_dir: PathBuf,
    pub conda_home: PathBuf,
}

impl IndexRequest {
    pub fn index_prefix(&self) -> PathBuf {
        self.output_dir.join(index_basename(&self.output_name))
    }
}

pub fn validate(request: &IndexRequest) -> Result<(), WrapperError> {
    if request.output_name.contains('/') {
        return Err(WrapperError::Argument {
            message: format!(
                "Output name '{}' must not contain a path separator",
                request.output_name
            ),
        });
    }
    validate_image(&request.container)?;
    validate_inputs([request.assembly.as_path()])
}

pub fn resolve_paths(request: &IndexRequest) -> Result<PathMapping, WrapperError> {
    PathMapping::resolve_with_output_dir(&[request.assembly.as_path()], &request.output_dir)
}

pub fn build_command(request: &IndexRequest, mapping: &PathMapping) -> Vec<String> {
    vec![
        TOOL.to_string(),
        mapping.container_input(&request.assembly),
        format!(
            "{}/{}",
            CONTAINER_OUTPUT_ROOT,
            index_basename(&request.output_name)
        ),
    ]
}

pub fn build_invocation(request: &IndexRequest, mapping: &PathMapping) -> ContainerInvocation {
    ContainerInvocation {
        tool: TOOL.to_string(),
        image: request.container.clone(),
        mounts: bind_mounts(mapping),
        activation: EnvironmentActivation::new(&request.conda_home, CONDA_ENV),
        command: build_command(request, mapping),
    }
}

pub fn summary(request: &IndexRequest) -> CompletionSummary {
    CompletionSummary::new(TOOL, &request.output_name)
        .with_output("indexDir", &request.output_dir)
        .with_output("indexPrefix", &request.index_prefix())
}

pub fn run(request: &IndexRequest) -> Result<CompletionSummary, WrapperError> {
    info!(assembly = %request.assembly.display(), name = %request.output_name, "starting bowtie2 index wrapper");
    validate(request)?;
    let mapping = resolve_paths(request)?;
    let invocation = build_invocation(request, &mapping);
    let result = capsules_container_exec::execute(&invocation)?;
    result.check(&invocation)?;
    info!(prefix = %request.index_prefix().display(), "bowtie2 index built");
    Ok(summary(request))
}
