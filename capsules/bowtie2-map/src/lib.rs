//! Bowtie2 read mapping against a prebuilt assembly index.
//!
//! Reads are bound at `/input`, the SAM output directory at `/output`, and the
//! index directory read-only at `/index`.

use capsules_bowtie2_index::index_basename;
use capsules_container_exec::{bind_mounts, BindMount, ContainerInvocation, EnvironmentActivation};
pub use capsules_container_exec::DEFAULT_CONDA_HOME;
use invocation::{
    existing_dir, validate_image, validate_inputs, CompletionSummary, PathMapping, WrapperError,
    CONTAINER_INDEX_ROOT, CONTAINER_OUTPUT_ROOT,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub const TOOL: &str = "bowtie2";
pub const CONDA_ENV: &str = "bowtie2";
/// Index file suffixes for small and large bowtie2 indexes.
const INDEX_MARKERS: [&str; 2] = [".1.bt2", ".1.bt2l"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub container: String,
    pub index_dir: PathBuf,
    pub assembly_name: String,
    pub metagenome_name: String,
    pub read1: Vec<PathBuf>,
    pub read2: Vec<PathBuf>,
    pub single: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub threads: u32,
    pub conda_home: PathBuf,
}

impl MapRequest {
    pub fn reads(&self) -> Vec<&Path> {
        self.read1
            .iter()
            .chain(&self.read2)
            .chain(&self.single)
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn sam_name(&self) -> String {
        format!(
            "{}_to_{}_bowtie2.sam",
            self.metagenome_name, self.assembly_name
        )
    }

    pub fn sam_path(&self) -> PathBuf {
        self.output_dir.join(self.sam_name())
    }
}

/// Host mounts of one mapping run: reads and output, plus the index root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPaths {
    pub mapping: PathMapping,
    pub index_root: PathBuf,
}

fn check_name(what: &str, name: &str) -> Result<(), WrapperError> {
    if name.contains('/') {
        return Err(WrapperError::Argument {
            message: format!("{what} '{name}' must not contain a path separator"),
        });
    }
    Ok(())
}

/// The index directory must hold `<assembly>_bowtie2_index.1.bt2` (or `.1.bt2l`).
fn validate_index(request: &MapRequest) -> Result<(), WrapperError> {
    let index_dir = existing_dir(&request.index_dir)?;
    let basename = index_basename(&request.assembly_name);
    let found = INDEX_MARKERS
        .iter()
        .any(|suffix| index_dir.join(format!("{basename}{suffix}")).is_file());
    if found {
        Ok(())
    } else {
        Err(WrapperError::InputNotFound {
            path: request
                .index_dir
                .join(format!("{basename}{}", INDEX_MARKERS[0])),
        })
    }
}

pub fn validate(request: &MapRequest) -> Result<(), WrapperError> {
    if request.read1.len() != request.read2.len() {
        return Err(WrapperError::UnpairedReads {
            r1: request.read1.len(),
            r2: request.read2.len(),
        });
    }
    check_name("Assembly name", &request.assembly_name)?;
    check_name("Metagenome name", &request.metagenome_name)?;
    validate_image(&request.container)?;
    validate_inputs(request.reads())?;
    validate_index(request)
}

pub fn resolve_paths(request: &MapRequest) -> Result<MapPaths, WrapperError> {
    let mapping = PathMapping::resolve_with_output_dir(&request.reads(), &request.output_dir)?;
    let index_root = existing_dir(&request.index_dir)?;
    info!(index = %index_root.display(), "resolved index mount");
    Ok(MapPaths {
        mapping,
        index_root,
    })
}

fn joined(mapping: &PathMapping, reads: &[PathBuf]) -> String {
    reads
        .iter()
        .map(|read| mapping.container_input(read))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn build_command(request: &MapRequest, paths: &MapPaths) -> Vec<String> {
    let mapping = &paths.mapping;
    let mut cmd = vec![TOOL.to_string()];
    cmd.extend([
        "-x".to_string(),
        format!(
            "{}/{}",
            CONTAINER_INDEX_ROOT,
            index_basename(&request.assembly_name)
        ),
    ]);
    cmd.extend(["-1".to_string(), joined(mapping, &request.read1)]);
    cmd.extend(["-2".to_string(), joined(mapping, &request.read2)]);
    if !request.single.is_empty() {
        cmd.extend(["-U".to_string(), joined(mapping, &request.single)]);
    }
    cmd.extend(["-p".to_string(), request.threads.to_string()]);
    cmd.extend([
        "-S".to_string(),
        format!("{}/{}", CONTAINER_OUTPUT_ROOT, request.sam_name()),
    ]);
    cmd
}

pub fn build_invocation(request: &MapRequest, paths: &MapPaths) -> ContainerInvocation {
    let mut mounts = bind_mounts(&paths.mapping);
    mounts.push(BindMount {
        source: paths.index_root.clone(),
        target: CONTAINER_INDEX_ROOT,
        read_only: true,
    });
    ContainerInvocation {
        tool: TOOL.to_string(),
        image: request.container.clone(),
        mounts,
        activation: EnvironmentActivation::new(&request.conda_home, CONDA_ENV),
        command: build_command(request, paths),
    }
}

pub fn summary(request: &MapRequest) -> CompletionSummary {
    CompletionSummary::new(TOOL, &request.metagenome_name)
        .with_output("outputDir", &request.output_dir)
        .with_output("sam", &request.sam_path())
}

pub fn run(request: &MapRequest) -> Result<CompletionSummary, WrapperError> {
    info!(
        metagenome = %request.metagenome_name,
        assembly = %request.assembly_name,
        pairs = request.read1.len(),
        "starting bowtie2 mapping wrapper"
    );
    validate(request)?;
    let paths = resolve_paths(request)?;
    let invocation = build_invocation(request, &paths);
    let result = capsules_container_exec::execute(&invocation)?;
    result.check(&invocation)?;
    info!(sam = %request.sam_path().display(), "bowtie2 mapping completed");
    Ok(summary(request))
}
