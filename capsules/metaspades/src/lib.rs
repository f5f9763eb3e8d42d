//! metaSPAdes assembly inside a container image.

use capsules_container_exec::{bind_mounts, ContainerInvocation, EnvironmentActivation};
pub use capsules_container_exec::DEFAULT_CONDA_HOME;
use invocation::{
    validate_image, validate_inputs, CompletionSummary, PathMapping, WrapperError,
    CONTAINER_OUTPUT_ROOT,
};
use std::path::{Path, PathBuf};
use tracing::info;

mod kmers;

pub use kmers::{KmerList, DEFAULT_KMERS};

pub const TOOL: &str = "spades.py";
pub const CONDA_ENV: &str = "spades";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpadesRequest {
    pub container: String,
    pub assembly_id: String,
    pub num_threads: u32,
    pub read1: Vec<PathBuf>,
    pub read2: Vec<PathBuf>,
    pub single: Vec<PathBuf>,
    pub merged: Vec<PathBuf>,
    pub memory_gb: Option<u32>,
    pub kmers: KmerList,
    pub output_dir: PathBuf,
    pub conda_home: PathBuf,
}

impl SpadesRequest {
    /// Every read file, first R1 leading.
    pub fn inputs(&self) -> Vec<&Path> {
        self.read1
            .iter()
            .chain(&self.read2)
            .chain(&self.single)
            .chain(&self.merged)
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn check_pairs(&self) -> Result<(), WrapperError> {
        if self.read1.len() != self.read2.len() {
            return Err(WrapperError::UnpairedReads {
                r1: self.read1.len(),
                r2: self.read2.len(),
            });
        }
        Ok(())
    }
}

pub fn validate(request: &SpadesRequest) -> Result<(), WrapperError> {
    request.check_pairs()?;
    validate_image(&request.container)?;
    validate_inputs(request.inputs())
}

pub fn resolve_paths(request: &SpadesRequest) -> Result<PathMapping, WrapperError> {
    PathMapping::resolve_with_output_dir(&request.inputs(), &request.output_dir)
}

pub fn build_command(request: &SpadesRequest, mapping: &PathMapping) -> Vec<String> {
    let mut cmd = vec![TOOL.to_string(), "--meta".to_string()];
    cmd.extend(["-o".to_string(), CONTAINER_OUTPUT_ROOT.to_string()]);
    cmd.extend(["-t".to_string(), request.num_threads.to_string()]);
    if let Some(memory) = request.memory_gb {
        cmd.extend(["-m".to_string(), memory.to_string()]);
    }
    cmd.extend(["-k".to_string(), request.kmers.to_string()]);

    for (i, (r1, r2)) in request.read1.iter().zip(&request.read2).enumerate() {
        let (flag1, flag2) = if i == 0 {
            ("-1".to_string(), "-2".to_string())
        } else {
            (format!("--pe{i}-1"), format!("--pe{i}-2"))
        };
        cmd.extend([flag1, mapping.container_input(r1)]);
        cmd.extend([flag2, mapping.container_input(r2)]);
    }

    for read in &request.single {
        cmd.extend(["-s".to_string(), mapping.container_input(read)]);
    }
    for read in &request.merged {
        cmd.extend(["--merged".to_string(), mapping.container_input(read)]);
    }
    cmd
}

pub fn build_invocation(request: &SpadesRequest, mapping: &PathMapping) -> ContainerInvocation {
    ContainerInvocation {
        tool: TOOL.to_string(),
        image: request.container.clone(),
        mounts: bind_mounts(mapping),
        activation: EnvironmentActivation::new(&request.conda_home, CONDA_ENV),
        command: build_command(request, mapping),
    }
}

pub fn summary(request: &SpadesRequest) -> CompletionSummary {
    let dir = &request.output_dir;
    CompletionSummary::new("metaspades", &request.assembly_id)
        .with_output("outputDir", dir)
        .with_output("contigs", &dir.join("contigs.fasta"))
        .with_output("scaffolds", &dir.join("scaffolds.fasta"))
        .with_report("log", &dir.join("spades.log"))
}

pub fn run(request: &SpadesRequest) -> Result<CompletionSummary, WrapperError> {
    info!(assembly_id = %request.assembly_id, kmers = %request.kmers, "starting metaSPAdes wrapper");
    validate(request)?;
    let mapping = resolve_paths(request)?;
    if let Some(memory) = request.memory_gb {
        info!(memory_gb = memory, "limiting SPAdes memory");
    }
    let invocation = build_invocation(request, &mapping);
    let result = capsules_container_exec::execute(&invocation)?;
    result.check(&invocation)?;
    info!(assembly_id = %request.assembly_id, "metaSPAdes completed");
    Ok(summary(request))
}
