//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Environment variable holding the WATS REST API token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "WATS_REST_API_TOKEN";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Test station identity used when the command line does not override it
    #[serde(default)]
    pub station: StationConfig,

    /// WATS server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Station metadata written into every report header
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct StationConfig {
    pub machine_name: Option<String>,
    pub location: Option<String>,
    pub purpose: Option<String>,
    pub operator: Option<String>,
}

/// WATS server settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://company.wats.com`. Upload is skipped when unset.
    pub base_url: Option<String>,

    /// Name of the environment variable that contains the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Report output settings
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct OutputConfig {
    /// Directory where finished reports are saved
    pub save_dir: Option<PathBuf>,

    /// Write indented JSON files
    #[serde(default)]
    pub pretty: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(config.server.timeout_secs, 10);
        assert!(config.server.base_url.is_none());
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [station]
            machine_name = "rig-01"
            location = "Trondheim"
            purpose = "production"

            [server]
            base_url = "https://company.wats.com"
            token_env = "MY_TOKEN"

            [output]
            save_dir = "/var/reports"
            pretty = true
            "#,
        )
        .unwrap();

        assert_eq!(config.station.machine_name.as_deref(), Some("rig-01"));
        assert_eq!(config.server.base_url.as_deref(), Some("https://company.wats.com"));
        assert_eq!(config.server.token_env, "MY_TOKEN");
        assert_eq!(config.output.save_dir, Some(PathBuf::from("/var/reports")));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_invalid_config_is_parse_error() {
        let err = Config::parse("[server]\ntimeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
