//! Platform configuration, log and report paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/wsjf-report/` and `~/.local/share/wsjf-report/`
//! - macOS: `~/Library/Application Support/wsjf-report/`
//! - Windows: `%APPDATA%\wsjf-report\`

use std::path::PathBuf;

/// Application name used for all platform directories
const APP_NAME: &str = "wsjf-report";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Default directory for saved reports when none is configured
pub fn default_report_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("reports"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }

    #[test]
    fn test_log_dir_under_data_dir() {
        if let Some(dir) = log_dir() {
            assert!(dir.ends_with("logs"));
        }
    }
}
