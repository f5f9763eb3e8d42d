//! # Invocation
//!
//! Shared plumbing for the containerized tool wrappers: the error taxonomy every
//! stage reports through, host-side input validation, derivation of the bind
//! mount roots, and the completion summary printed after a successful run.
//!
//! A wrapper run is strictly linear: parse, validate, resolve, build, execute,
//! report. Each stage returns [`WrapperError`] on failure and later stages are
//! never attempted.

pub mod error;
pub mod paths;
pub mod summary;

pub use error::{WrapperError, WRAPPER_FAILURE_EXIT};
pub use paths::{
    ensure_output_dir, existing_dir, mount_root_for, validate_image, validate_inputs,
    PathMapping, CONTAINER_INDEX_ROOT, CONTAINER_INPUT_ROOT, CONTAINER_OUTPUT_ROOT,
};
pub use summary::CompletionSummary;
