//! CLI command definitions
//!
//! Defines the clap commands for the report CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a YAML test scenario and produce a report
    Run(RunArgs),

    /// Parse a saved report and re-check its statuses
    Validate {
        /// Path to the report JSON file
        report: PathBuf,
    },

    /// Upload a saved report
    Upload {
        /// Path to the report JSON file
        report: PathBuf,

        /// Server base URL (default: from config)
        #[arg(long)]
        base_url: Option<String>,

        /// Environment variable holding the API token
        #[arg(long)]
        token_env: Option<String>,
    },

    /// Show the configuration file path and the effective configuration
    Config,
}

/// Options of the `run` command
///
/// Station fields fall back to the `[station]` section of the config file.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the scenario YAML file
    pub scenario: PathBuf,

    /// Part number of the unit under test
    #[arg(long)]
    pub part_number: String,

    /// Serial number of the unit under test
    #[arg(long)]
    pub serial_number: String,

    /// Part revision
    #[arg(long, default_value = "1")]
    pub revision: String,

    /// Process (operation type) code
    #[arg(long, default_value = "10")]
    pub process_code: i32,

    /// Product name shown next to the part number
    #[arg(long)]
    pub product_name: Option<String>,

    /// Process name shown next to the process code
    #[arg(long)]
    pub process_name: Option<String>,

    /// Test station name
    #[arg(long)]
    pub machine_name: Option<String>,

    /// Test station location
    #[arg(long)]
    pub location: Option<String>,

    /// Test station purpose
    #[arg(long)]
    pub purpose: Option<String>,

    /// Operator running the test
    #[arg(long)]
    pub operator: Option<String>,

    /// Directory to save the report in
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Server base URL (default: from config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Environment variable holding the API token
    #[arg(long)]
    pub token_env: Option<String>,

    /// Do not upload the report
    #[arg(long)]
    pub no_upload: bool,

    /// Write indented JSON
    #[arg(long)]
    pub pretty: bool,
}
