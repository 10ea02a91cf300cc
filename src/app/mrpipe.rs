use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use mrpipe::cmd::{Args, Commands};
use mrpipe::config::Config;
use mrpipe::partition::{self, Partitioner};
use mrpipe::verify::Report;
use mrpipe::{reduce, verify};
use tracing::error;
use tracing_subscriber::EnvFilter;

// 0 = pass / normal completion, 1 = verification failure, 2 = fatal error
// (bad configuration or malformed input).
const EXIT_VERIFY_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    // Stage output goes to stdout; diagnostics must stay off it.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            error!("fatal: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();

    match args.command {
        Commands::Partition {
            strategy,
            normalize,
        } => {
            // Validated once, before any input is consumed.
            let config = Config::from_env()?;
            let partitioner = Partitioner::new(strategy, normalize, &config);
            partition::run(stdin, stdout, &partitioner)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reduce => {
            reduce::run(stdin, stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            mode,
            input,
            output,
        } => match verify::verify(mode, &input, &output)? {
            // Success is silent; the exit code is the whole verdict.
            Report::Pass => Ok(ExitCode::SUCCESS),
            Report::CardinalityMismatch { .. } | Report::ContentMismatch { .. } => {
                Ok(ExitCode::from(EXIT_VERIFY_FAILED))
            }
        },
    }
}
