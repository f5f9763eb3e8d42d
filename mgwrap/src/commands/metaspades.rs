use std::path::PathBuf;

use anyhow::Result;
use capsules_metaspades::{KmerList, SpadesRequest, DEFAULT_CONDA_HOME, DEFAULT_KMERS};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;
use invocation::WrapperError;

use super::{paths, print_summary};

#[derive(Debug, Args)]
pub struct MetaspadesArgs {
    /// Path to the SPAdes container image
    #[arg(long = "spades_container", value_name = "IMAGE", value_parser = NonEmptyStringValueParser::new())]
    pub spades_container: String,
    /// Assembly identifier reported in the completion summary
    #[arg(long = "assembly_id", value_name = "ID", value_parser = NonEmptyStringValueParser::new())]
    pub assembly_id: String,
    #[arg(long = "num_threads", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub num_threads: u32,
    /// R1 files, one per paired library
    #[arg(long = "input_read1", value_name = "FILE", num_args = 1.., required = true, value_parser = NonEmptyStringValueParser::new())]
    pub input_read1: Vec<String>,
    /// R2 files, same order and count as R1
    #[arg(long = "input_read2", value_name = "FILE", num_args = 1.., required = true, value_parser = NonEmptyStringValueParser::new())]
    pub input_read2: Vec<String>,
    /// Unpaired reads, typically fastp's unpaired outputs
    #[arg(long = "input_single", value_name = "FILE", num_args = 1.., value_parser = NonEmptyStringValueParser::new())]
    pub input_single: Vec<String>,
    /// Merged reads from fastp
    #[arg(long = "input_merged", value_name = "FILE", num_args = 1.., value_parser = NonEmptyStringValueParser::new())]
    pub input_merged: Vec<String>,
    /// Memory limit for SPAdes in GB (-m)
    #[arg(long = "memory_gb", value_name = "GB", value_parser = clap::value_parser!(u32).range(1..))]
    pub memory_gb: Option<u32>,
    /// Odd k-mer sizes, comma separated
    #[arg(long = "kmers", value_name = "LIST", default_value = DEFAULT_KMERS, value_parser = parse_kmers)]
    pub kmers: KmerList,
    #[arg(long = "output_dir", value_name = "DIR", value_parser = NonEmptyStringValueParser::new())]
    pub output_dir: String,
    #[arg(
        long = "conda_home",
        value_name = "DIR",
        env = "MGWRAP_CONDA_HOME",
        default_value = DEFAULT_CONDA_HOME
    )]
    pub conda_home: PathBuf,
}

fn parse_kmers(value: &str) -> Result<KmerList, WrapperError> {
    value.parse()
}

impl MetaspadesArgs {
    pub fn into_request(self) -> SpadesRequest {
        SpadesRequest {
            container: self.spades_container,
            assembly_id: self.assembly_id,
            num_threads: self.num_threads,
            read1: paths(self.input_read1),
            read2: paths(self.input_read2),
            single: paths(self.input_single),
            merged: paths(self.input_merged),
            memory_gb: self.memory_gb,
            kmers: self.kmers,
            output_dir: self.output_dir.into(),
            conda_home: self.conda_home,
        }
    }
}

pub fn run(args: MetaspadesArgs) -> Result<()> {
    let request = args.into_request();
    let summary = capsules_metaspades::run(&request)?;
    print_summary(&summary)
}
