//! Error types for report construction, serialization and upload
//!
//! Structural misuse of the report API surfaces as `Validation`,
//! `IllegalState` or `Schema`. A failing test is never an error: it is
//! recorded as a status in the report.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the report library and CLI
#[derive(Error, Debug)]
pub enum Error {
    // === Report Model Errors ===
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Schema error: {0}")]
    Schema(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Environment variable {0} not set. Please set it to your WATS API token")]
    MissingToken(String),

    // === Upload Errors ===
    #[error("Upload rejected with status {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error for a missing or blank required field
    pub fn missing_field(field: &str) -> Self {
        Self::Validation(format!("required field `{}` is missing or blank", field))
    }

    /// Create a validation error for a field exceeding its length limit
    pub fn too_long(field: &str, max: usize, actual: usize) -> Self {
        Self::Validation(format!(
            "field `{}` is {} characters long, maximum is {}",
            field, actual, max
        ))
    }

    /// Create an illegal state error for a mutation attempted on a finalized tree
    pub fn finalized(action: &str) -> Self {
        Self::IllegalState(format!("cannot {} after the report was finalized", action))
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// True for the three structural report errors
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::IllegalState(_) | Error::Schema(_)
        )
    }
}

/// Validate a required text field: non-blank and at most `max` characters
pub(crate) fn require(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::missing_field(field));
    }
    limit(field, value, max)
}

/// Validate an optional text field length
pub(crate) fn limit(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::too_long(field, max, len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert!(matches!(require("pn", "  ", 100), Err(Error::Validation(_))));
        assert!(require("pn", "9999", 100).is_ok());
    }

    #[test]
    fn test_limit_counts_chars_not_bytes() {
        assert!(limit("unit", "µµµµ", 4).is_ok());
        let err = limit("unit", "abcde", 4).unwrap_err();
        assert!(err.to_string().contains("maximum is 4"));
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::finalized("append").is_structural());
        assert!(Error::Schema("x".into()).is_structural());
        assert!(!Error::Config("x".into()).is_structural());
    }
}
