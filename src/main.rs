//! wsjf - run test scenarios and report them to WATS
//!
//! Builds a WSJF report from a test run, saves it and uploads it.

use clap::Parser;
use std::process::ExitCode;
use wsjf::common::{logging, paths};
use wsjf::{cli, commands};
use commands::Commands;

#[derive(Parser)]
#[command(name = "wsjf", about = "Build, save and upload WATS test reports")]
#[command(version, long_about = None)]
struct Cli {
    /// Log debug output and show command output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = match paths::log_dir() {
        Some(dir) => logging::init_with_file(&dir, cli.verbose),
        None => {
            logging::init_cli(cli.verbose);
            None
        }
    };

    match cli::dispatch(cli.command, cli.verbose).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
