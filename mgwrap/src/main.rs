use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use invocation::{WrapperError, WRAPPER_FAILURE_EXIT};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(
    name = "mgwrap",
    version,
    about = "Run metagenomics tools inside container images with fixed conventions"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trim paired-end reads with fastp
    Fastp(commands::fastp::FastpArgs),
    /// Assemble trimmed reads with metaSPAdes
    Metaspades(commands::metaspades::MetaspadesArgs),
    /// Build a bowtie2 index for an assembly
    #[command(name = "bowtie2-index")]
    Bowtie2Index(commands::bowtie2_index::Bowtie2IndexArgs),
    /// Map reads against an assembly index with bowtie2
    #[command(name = "bowtie2-map")]
    Bowtie2Map(commands::bowtie2_map::Bowtie2MapArgs),
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let error = commands::parse_error(&err);
            eprint!("{error}");
            return exit_code(error.exit_code());
        }
    };

    let outcome = match cli.cmd {
        Commands::Fastp(args) => commands::fastp::run(args),
        Commands::Metaspades(args) => commands::metaspades::run(args),
        Commands::Bowtie2Index(args) => commands::bowtie2_index::run(args),
        Commands::Bowtie2Map(args) => commands::bowtie2_map::run(args),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<WrapperError>()
                .map(WrapperError::exit_code)
                .unwrap_or(WRAPPER_FAILURE_EXIT);
            if let Some(wrapper) = err.downcast_ref::<WrapperError>() {
                error!(code = wrapper.code(), exit_code = code, "wrapper failed");
            }
            eprintln!("Error: {err:#}");
            exit_code(code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
