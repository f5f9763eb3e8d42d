use std::path::PathBuf;

use anyhow::Result;
use capsules_bowtie2_map::{MapRequest, DEFAULT_CONDA_HOME};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;

use super::{paths, print_summary};

#[derive(Debug, Args)]
pub struct Bowtie2MapArgs {
    /// Path to the bowtie2 container image
    #[arg(long = "bowtie2_container", value_name = "IMAGE", value_parser = NonEmptyStringValueParser::new())]
    pub bowtie2_container: String,
    /// Directory holding `<assembly-name>_bowtie2_index.*`
    #[arg(long = "bowtie2_index_folder", value_name = "DIR", value_parser = NonEmptyStringValueParser::new())]
    pub bowtie2_index_folder: String,
    /// R1 files, one per paired library
    #[arg(long = "r1", value_name = "FILE", num_args = 1.., required = true, value_parser = NonEmptyStringValueParser::new())]
    pub r1: Vec<String>,
    /// R2 files, same order and count as R1
    #[arg(long = "r2", value_name = "FILE", num_args = 1.., required = true, value_parser = NonEmptyStringValueParser::new())]
    pub r2: Vec<String>,
    /// Unpaired reads, typically fastp's unpaired outputs
    #[arg(long = "single", value_name = "FILE", num_args = 1.., value_parser = NonEmptyStringValueParser::new())]
    pub single: Vec<String>,
    #[arg(long = "output-dir", value_name = "DIR", value_parser = NonEmptyStringValueParser::new())]
    pub output_dir: String,
    #[arg(long = "assembly-name", value_name = "NAME", value_parser = NonEmptyStringValueParser::new())]
    pub assembly_name: String,
    #[arg(long = "metagenome-name", value_name = "NAME", value_parser = NonEmptyStringValueParser::new())]
    pub metagenome_name: String,
    #[arg(long = "threads", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: u32,
    #[arg(
        long = "conda_home",
        value_name = "DIR",
        env = "MGWRAP_CONDA_HOME",
        default_value = DEFAULT_CONDA_HOME
    )]
    pub conda_home: PathBuf,
}

impl Bowtie2MapArgs {
    pub fn into_request(self) -> MapRequest {
        MapRequest {
            container: self.bowtie2_container,
            index_dir: self.bowtie2_index_folder.into(),
            assembly_name: self.assembly_name,
            metagenome_name: self.metagenome_name,
            read1: paths(self.r1),
            read2: paths(self.r2),
            single: paths(self.single),
            output_dir: self.output_dir.into(),
            threads: self.threads,
            conda_home: self.conda_home,
        }
    }
}

pub fn run(args: Bowtie2MapArgs) -> Result<()> {
    let request = args.into_request();
    let summary = capsules_bowtie2_map::run(&request)?;
    print_summary(&summary)
}
