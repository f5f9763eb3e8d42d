use std::path::PathBuf;

use anyhow::Result;
use capsules_bowtie2_index::{IndexRequest, DEFAULT_CONDA_HOME};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;

use super::print_summary;

#[derive(Debug, Args)]
pub struct Bowtie2IndexArgs {
    /// Path to the bowtie2 container image
    #[arg(long = "bowtie2_container", value_name = "IMAGE", value_parser = NonEmptyStringValueParser::new())]
    pub bowtie2_container: String,
    /// Assembly FASTA to index
    #[arg(long = "input-assembly", value_name = "FILE", value_parser = NonEmptyStringValueParser::new())]
    pub input_assembly: String,
    /// Index name, usually the assembly id
    #[arg(long = "output-name", value_name = "NAME", value_parser = NonEmptyStringValueParser::new())]
    pub output_name: String,
    #[arg(long = "output-dir", value_name = "DIR", value_parser = NonEmptyStringValueParser::new())]
    pub output_dir: String,
    #[arg(
        long = "conda_home",
        value_name = "DIR",
        env = "MGWRAP_CONDA_HOME",
        default_value = DEFAULT_CONDA_HOME
    )]
    pub conda_home: PathBuf,
}

impl Bowtie2IndexArgs {
    pub fn into_request(self) -> IndexRequest {
        IndexRequest {
            container: self.bowtie2_container,
            assembly: self.input_assembly.into(),
            output_name: self.output_name,
            output_dir: self.output_dir.into(),
            conda_home: self.conda_home,
        }
    }
}

pub fn run(args: Bowtie2IndexArgs) -> Result<()> {
    let request = args.into_request();
    let summary = capsules_bowtie2_index::run(&request)?;
    print_summary(&summary)
}
