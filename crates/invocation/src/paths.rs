use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::WrapperError;

/// Read-only mount point for the host input directory.
pub const CONTAINER_INPUT_ROOT: &str = "/input";
/// Read-write mount point for the host output directory.
pub const CONTAINER_OUTPUT_ROOT: &str = "/output";
/// Read-only mount point for a prebuilt read-mapping index.
pub const CONTAINER_INDEX_ROOT: &str = "/index";

/// Confirm every declared input exists on the host before any container is
/// launched. The first missing path is reported.
pub fn validate_inputs<'a, I>(paths: I) -> Result<(), WrapperError>
where
    I: IntoIterator<Item = &'a Path>,
{
    for path in paths {
        if !path.exists() {
            return Err(WrapperError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "input present");
    }
    Ok(())
}

/// Local image files must exist; registry references (`docker://`, `library://`)
/// are resolved by the container runtime.
pub fn validate_image(image: &str) -> Result<(), WrapperError> {
    if image.contains("://") {
        return Ok(());
    }
    validate_inputs([Path::new(image)])
}

/// Host directory of the first file of a role. Every other file of the role
/// must live in the same directory, otherwise its in-container path would not
/// resolve under the single mount.
pub fn mount_root_for(role: &'static str, files: &[&Path]) -> Result<PathBuf, WrapperError> {
    let (first, rest) = files.split_first().ok_or_else(|| WrapperError::MissingArgument {
        message: format!("At least one {role} file is required"),
    })?;

    for file in files {
        if file.file_name().is_none() {
            return Err(WrapperError::Argument {
                message: format!("{role} path {} does not name a file", file.display()),
            });
        }
    }

    let root = parent_dir(first).ok_or_else(|| WrapperError::Argument {
        message: format!("{role} path {} has no parent directory", first.display()),
    })?;

    for file in rest {
        if parent_dir(file).as_deref() != Some(root.as_path()) {
            return Err(WrapperError::MountRootMismatch {
                role,
                path: file.to_path_buf(),
                root,
            });
        }
    }

    Ok(root)
}

/// Create the output directory if absent. Repeated calls succeed.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf, WrapperError> {
    fs::create_dir_all(dir).map_err(|source| WrapperError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::canonicalize(dir).map_err(|source| WrapperError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// Canonical form of a directory that must already exist on the host, such as
/// a prebuilt index mounted read-only.
pub fn existing_dir(dir: &Path) -> Result<PathBuf, WrapperError> {
    match fs::canonicalize(dir) {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(WrapperError::InputNotFound {
            path: dir.to_path_buf(),
        }),
    }
}

/// Host directories bound into the container, one per role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
}

impl PathMapping {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
        }
    }

    /// Derive both mount roots from the first file of each role and make sure
    /// the output root exists. Inputs are expected to be validated already.
    pub fn resolve(inputs: &[&Path], outputs: &[&Path]) -> Result<Self, WrapperError> {
        let output_dir = mount_root_for("output", outputs)?;
        Self::resolve_with_output_dir(inputs, &output_dir)
    }

    /// Like [`PathMapping::resolve`] for tools that take an output directory
    /// instead of output files.
    pub fn resolve_with_output_dir(
        inputs: &[&Path],
        output_dir: &Path,
    ) -> Result<Self, WrapperError> {
        let input_root = mount_root_for("input", inputs)?;
        let input_root = fs::canonicalize(&input_root).map_err(|_| {
            WrapperError::InputNotFound {
                path: input_root.clone(),
            }
        })?;
        let output_root = ensure_output_dir(output_dir)?;

        let mapping = Self::new(input_root, output_root);
        info!(
            input = %mapping.input_root.display(),
            output = %mapping.output_root.display(),
            "resolved bind mounts"
        );
        Ok(mapping)
    }

    pub fn container_input(&self, host: &Path) -> String {
        remap(CONTAINER_INPUT_ROOT, host)
    }

    pub fn container_output(&self, host: &Path) -> String {
        remap(CONTAINER_OUTPUT_ROOT, host)
    }
}

fn remap(mount_point: &str, host: &Path) -> String {
    let name = host
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("{}/{}", mount_point, name)
}

fn parent_dir(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };
    absolute.parent().map(Path::to_path_buf)
}
