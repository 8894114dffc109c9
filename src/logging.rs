//! Structured logging for the CLI.
//!
//! `watch` runs for hours and keeps a JSON trail of every field run in a
//! daily-rotated file under the data directory ([`init_production`]). The
//! one-shot subcommands only log to stderr ([`init_cli`]), so their stdout
//! stays clean for reports and listings.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated log files.
pub const LOG_FILE_PREFIX: &str = "replysmith.log";

/// Filter used when `RUST_LOG` is unset. The HTML parser and HTTP stack
/// are chatty at `info` during rescans.
pub const DEFAULT_FILTER: &str = "info,html5ever=warn,selectors=warn,hyper=warn,reqwest=warn";

/// Keeps the file writer alive; dropping it flushes pending entries.
#[derive(Debug)]
pub struct LoggingGuard {
    logs_dir: PathBuf,
    _guard: WorkerGuard,
}

impl LoggingGuard {
    /// Directory the rotated files are written to.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }
}

/// `RUST_LOG` when set and valid, [`DEFAULT_FILTER`] otherwise.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Logging for `watch`: JSON lines to `{logs_dir}/replysmith.log.YYYY-MM-DD`
/// plus human-readable stderr.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(file_writer),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(LoggingGuard {
        logs_dir: logs_dir.to_path_buf(),
        _guard: guard,
    })
}

/// Stderr-only logging for one-shot subcommands. A no-op when a subscriber
/// is already installed.
pub fn init_cli() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
