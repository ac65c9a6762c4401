//! Structured logging for the sync agent.
//!
//! Two sinks: JSON lines in a daily-rolling file under the data directory,
//! and a compact human-readable stream on stderr. `RUST_LOG` overrides the
//! default filter.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{AppError, Result};

const LOG_FILE_NAME: &str = "usage-sync.log";
const CRATE_TARGETS: &[&str] = &["usage_sync_cli", "sync_app", "sync_state", "ingest"];

/// Flushes the file sink when dropped. Hold it for the life of the process.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    })
}

pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<LogGuard> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        AppError::Message(format!("create log dir {}: {}", log_dir.display(), err))
    })?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| AppError::Message(format!("install log subscriber: {}", err)))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Stderr-only logging, used when the file sink cannot be set up. Failing to
/// install it is ignored.
pub fn init_console_logging(verbose: bool) -> LogGuard {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
    LogGuard { _file_guard: None }
}
