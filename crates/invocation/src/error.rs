use std::path::PathBuf;
use thiserror::Error;

/// Exit status for every failure the wrapper detects on its own.
pub const WRAPPER_FAILURE_EXIT: i32 = 1;

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("{message}")]
    Argument { message: String },

    #[error("{message}")]
    MissingArgument { message: String },

    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error(
        "{role} file {} is not in mount root {}; all {role} files must share one directory",
        path.display(),
        root.display()
    )]
    MountRootMismatch {
        role: &'static str,
        path: PathBuf,
        root: PathBuf,
    },

    #[error("Failed to create output directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Environment activation script {script} not found inside the container")]
    EnvironmentActivation { script: String },

    #[error("Failed to spawn container runtime '{runtime}': {source}")]
    RuntimeSpawn {
        runtime: String,
        source: std::io::Error,
    },

    #[error("Failed waiting on container runtime: {source}")]
    ChildWait { source: std::io::Error },

    #[error("{tool} exited with code {code}")]
    ToolExecution { tool: String, code: i32 },

    #[error("{tool} was terminated by signal {signal}")]
    ToolTerminated { tool: String, signal: i32 },

    #[error("Invalid k-mer value '{value}': {reason}")]
    InvalidKmer { value: String, reason: String },

    #[error("Number of R1 files ({r1}) must match the number of R2 files ({r2})")]
    UnpairedReads { r1: usize, r2: usize },
}

impl WrapperError {
    /// Process exit status reported for this error. Tool failures pass the
    /// child's own code through untranslated.
    pub fn exit_code(&self) -> i32 {
        match self {
            WrapperError::ToolExecution { code, .. } => *code,
            WrapperError::ToolTerminated { signal, .. } => 128 + signal,
            _ => WRAPPER_FAILURE_EXIT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WrapperError::Argument { .. } => "ARGUMENT_ERROR",
            WrapperError::MissingArgument { .. } => "MISSING_ARGUMENT",
            WrapperError::InputNotFound { .. } => "INPUT_NOT_FOUND",
            WrapperError::MountRootMismatch { .. } => "MOUNT_ROOT_MISMATCH",
            WrapperError::DirectoryCreation { .. } => "DIRECTORY_CREATION",
            WrapperError::EnvironmentActivation { .. } => "ENVIRONMENT_ACTIVATION",
            WrapperError::RuntimeSpawn { .. } => "RUNTIME_SPAWN",
            WrapperError::ChildWait { .. } => "CHILD_WAIT",
            WrapperError::ToolExecution { .. } => "TOOL_EXECUTION",
            WrapperError::ToolTerminated { .. } => "TOOL_TERMINATED",
            WrapperError::InvalidKmer { .. } => "INVALID_KMER",
            WrapperError::UnpairedReads { .. } => "UNPAIRED_READS",
        }
    }
}
