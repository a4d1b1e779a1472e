//! YAML scenario runner
//!
//! Runs the shell commands of a test scenario inside a report session.
//! Each test becomes a sequence call; each check on its output becomes a
//! step, so the saved report mirrors the scenario file.

mod config;
#[allow(clippy::module_inception)]
mod runner;

pub use config::*;
pub use runner::{load_scenario, parse_key_values, run_scenario};
