use std::path::PathBuf;

use anyhow::Result;
use capsules_fastp::{FastpRequest, DEFAULT_CONDA_HOME};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;

use super::{optional_path, print_summary};

#[derive(Debug, Args)]
pub struct FastpArgs {
    /// Path to the fastp container image
    #[arg(long = "fastp_container", value_name = "IMAGE", value_parser = NonEmptyStringValueParser::new())]
    pub fastp_container: String,
    /// Sample identifier reported in the completion summary
    #[arg(long = "metagenome_id", value_name = "ID", value_parser = NonEmptyStringValueParser::new())]
    pub metagenome_id: String,
    /// Threads handed to fastp
    #[arg(long = "num_threads", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub num_threads: u32,
    #[arg(long = "input_read1", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub input_read1: String,
    #[arg(long = "input_read2", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub input_read2: String,
    #[arg(long = "output_trimmed_r1", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub output_trimmed_r1: String,
    #[arg(long = "output_trimmed_r2", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub output_trimmed_r2: String,
    #[arg(long = "output_json", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub output_json: String,
    #[arg(long = "output_html", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub output_html: String,
    /// Reads whose mate failed filtering (R1 side). Optional
    #[arg(long = "output_unpaired1", value_name = "FILE")]
    pub output_unpaired1: Option<String>,
    /// Reads whose mate failed filtering (R2 side). Optional
    #[arg(long = "output_unpaired2", value_name = "FILE")]
    pub output_unpaired2: Option<String>,
    /// Merge overlapping pairs into this file. Optional
    #[arg(long = "output_merged", value_name = "FILE")]
    pub output_merged: Option<String>,
    /// Reads failing filters. Optional
    #[arg(long = "output_failed", value_name = "FILE")]
    pub output_failed: Option<String>,
    /// Conda installation inside the image
    #[arg(
        long = "conda_home",
        value_name = "DIR",
        env = "MGWRAP_CONDA_HOME",
        default_value = DEFAULT_CONDA_HOME
    )]
    pub conda_home: PathBuf,
}

impl FastpArgs {
    pub fn into_request(self) -> FastpRequest {
        FastpRequest {
            container: self.fastp_container,
            metagenome_id: self.metagenome_id,
            num_threads: self.num_threads,
            input_read1: self.input_read1.into(),
            input_read2: self.input_read2.into(),
            output_trimmed_r1: self.output_trimmed_r1.into(),
            output_trimmed_r2: self.output_trimmed_r2.into(),
            output_json: self.output_json.into(),
            output_html: self.output_html.into(),
            output_unpaired1: optional_path(self.output_unpaired1),
            output_unpaired2: optional_path(self.output_unpaired2),
            output_merged: optional_path(self.output_merged),
            output_failed: optional_path(self.output_failed),
            conda_home: self.conda_home,
        }
    }
}

pub fn run(args: FastpArgs) -> Result<()> {
    let request = args.into_request();
    let summary = capsules_fastp::run(&request)?;
    print_summary(&summary)
}
