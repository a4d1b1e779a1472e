//! Logging and tracing configuration
//!
//! The CLI logs to stderr. When a log directory is available, a second
//! layer writes a daily rolling file so finished sessions can be audited.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Base name of the rolling session log file
const LOG_FILE_NAME: &str = "wsjf.log";

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("wsjf=debug,info")
        } else {
            EnvFilter::new("wsjf=info,warn")
        }
    })
}

/// Initialize tracing for the CLI (stderr logging only)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing with stderr and a rolling log file in `log_dir`
///
/// The returned guard must be held until the process exits, otherwise
/// buffered file output is lost. Falls back to stderr only when the
/// directory cannot be created.
pub fn init_with_file(log_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_cli(verbose);
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some(guard)
}
