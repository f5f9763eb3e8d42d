use clap::error::ErrorKind;
use invocation::WrapperError;

pub mod bowtie2_index;
pub mod bowtie2_map;
pub mod fastp;
pub mod metaspades;

/// Classify a clap failure into the wrapper taxonomy, keeping clap's rendered
/// message (including the usage line).
pub fn parse_error(err: &clap::Error) -> WrapperError {
    let message = err.render().to_string();
    match err.kind() {
        ErrorKind::MissingRequiredArgument => WrapperError::MissingArgument { message },
        _ => WrapperError::Argument { message },
    }
}

/// Optional paths passed as empty strings count as absent.
pub(crate) fn optional_path(value: Option<String>) -> Option<std::path::PathBuf> {
    value.filter(|v| !v.is_empty()).map(Into::into)
}

pub(crate) fn paths(values: Vec<String>) -> Vec<std::path::PathBuf> {
    values.into_iter().map(Into::into).collect()
}

pub(crate) fn print_summary(summary: &invocation::CompletionSummary) -> anyhow::Result<()> {
    use anyhow::Context;

    let rendered = summary
        .to_json()
        .context("Failed to serialize completion summary")?;
    println!("{rendered}");
    Ok(())
}
