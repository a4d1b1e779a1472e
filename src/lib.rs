//! wsjf - WATS WSJF test reports
//!
//! This library builds test reports in the WATS Standard JSON Format,
//! checks their status invariants, serializes and parses them, and uploads
//! them to a WATS server. A session hook and a YAML scenario runner turn a
//! test run into a report.

pub mod cli;
pub mod commands;
pub mod common;
pub mod report;
pub mod runner;
pub mod session;
pub mod upload;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use report::{FinalizedReport, Report, ReportIdentity, Sequence, Status, Step};
