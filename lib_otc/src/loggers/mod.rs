//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for binaries built on the client.
//! The library itself only emits events; it never installs a subscriber.
//!
//! - Console output is human-readable with ANSI colors.
//! - With a log directory, events are also written as JSON lines to a
//!   daily-rotating file through a non-blocking writer.
//! - `RUST_LOG` takes precedence over the configured level when set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where and how verbosely to log.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`. Anything else means `info`.
    pub level: String,
    /// Directory for the rotating log file. Console only when `None`.
    pub log_dir: Option<PathBuf>,
    /// Base name of the log files.
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "otc_client".to_string(),
        }
    }
}

#[cfg(feature = "configs")]
impl From<&crate::configs::Settings> for LogSettings {
    fn from(settings: &crate::configs::Settings) -> Self {
        Self {
            level: settings.log_level.clone().unwrap_or_else(|| "info".to_string()),
            log_dir: settings.log_dir.clone(),
            ..Self::default()
        }
    }
}

/// Normalizes a level name, falling back to `info`.
pub fn parse_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// # Setup Logging
///
/// Configures the global subscriber. The returned guard flushes the file
/// writer when dropped, so keep it alive for the lifetime of the program.
pub fn setup_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let level = parse_level(&settings.level);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let (file_layer, guard) = match &settings.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
            let appender = rolling::daily(log_dir, &settings.file_prefix);
            let (writer, guard) = non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!("Logging initialized with level: {}", level);
    Ok(guard)
}
