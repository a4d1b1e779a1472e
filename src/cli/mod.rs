//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use crate::commands::{Commands, RunArgs};
use crate::common::config::{Config, ServerConfig};
use crate::common::{paths, Error, Result};
use crate::report::{FinalizedReport, ReportIdentity, Status};
use crate::runner;
use crate::session::{Session, SessionOptions};
use crate::upload::{ReportUploader, WatsClient};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, verbose: bool) -> Result<ExitCode> {
    let config = Config::load()?;

    match command {
        Commands::Run(args) => run(args, &config, verbose).await,

        Commands::Validate { report } => {
            let report = read_report(&report)?;
            let root = report
                .root()
                .ok_or_else(|| Error::Internal("finalized report without root".to_string()))?;
            println!("Report:   {}", report.id());
            println!("Root:     {}", root.name());
            println!("Nodes:    {}", root.node_count());
            println!("Status:   {}", colored_status(report.status()));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Upload {
            report,
            base_url,
            token_env,
        } => {
            let parsed = read_report(&report)?;
            let client = client(&config.server, base_url, token_env)?
                .ok_or_else(|| Error::Config("no server base URL configured".to_string()))?;
            let receipt = client.upload(&parsed.to_json()?).await?;
            println!("Uploaded report {}", receipt.id);
            println!("  {}", receipt.view_url);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config => {
            match paths::config_path() {
                Some(path) if path.exists() => println!("# {}", path.display()),
                Some(path) => println!("# {} (not found, using defaults)", path.display()),
                None => println!("# no configuration directory on this platform"),
            }
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(args: RunArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let scenario = runner::load_scenario(&args.scenario)?;
    let dir = args
        .scenario
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file = args.scenario.display().to_string();

    let station = &config.station;
    let identity = ReportIdentity {
        part_number: args.part_number,
        serial_number: args.serial_number,
        revision: args.revision,
        process_code: args.process_code,
        machine_name: args
            .machine_name
            .or_else(|| station.machine_name.clone())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_default(),
        location: args
            .location
            .or_else(|| station.location.clone())
            .unwrap_or_default(),
        purpose: args
            .purpose
            .or_else(|| station.purpose.clone())
            .unwrap_or_default(),
        operator: args
            .operator
            .or_else(|| station.operator.clone())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default(),
        product_name: args.product_name,
        process_name: args.process_name,
    };

    let mut session = Session::start(SessionOptions {
        identity,
        name: scenario.name.clone(),
        save_dir: args
            .save_dir
            .or_else(|| config.output.save_dir.clone())
            .or_else(paths::default_report_dir),
        pretty: args.pretty || config.output.pretty,
    })?;
    if !args.no_upload {
        if let Some(client) = client(&config.server, args.base_url, args.token_env)? {
            session = session.with_uploader(Box::new(client));
        }
    }

    let exit = runner::run_scenario(&scenario, dir, &file, &mut session, verbose).await?;
    let summary = session.finish(exit).await?;

    println!("Report {}: {}", summary.report.id(), colored_status(summary.status()));
    if let Some(path) = &summary.saved_to {
        println!("  Saved to {}", path.display());
    }
    if let Some(receipt) = &summary.receipt {
        println!("  Uploaded: {}", receipt.view_url);
    }

    Ok(if summary.status().is_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Build an upload client, or `None` when no base URL is known
fn client(
    server: &ServerConfig,
    base_url: Option<String>,
    token_env: Option<String>,
) -> Result<Option<WatsClient>> {
    let Some(base_url) = base_url.or_else(|| server.base_url.clone()) else {
        return Ok(None);
    };
    let mut server = server.clone();
    if let Some(token_env) = token_env {
        server.token_env = token_env;
    }
    WatsClient::from_env(&base_url, &server).map(Some)
}

fn read_report(path: &Path) -> Result<FinalizedReport> {
    let bytes = std::fs::read(path).map_err(|e| Error::file_read(path, &e))?;
    FinalizedReport::from_json(&bytes)
}

fn colored_status(status: Status) -> String {
    match status {
        Status::Passed => "Passed".green().bold().to_string(),
        Status::Failed => "Failed".red().bold().to_string(),
        Status::Error => "Error".red().bold().to_string(),
    }
}
