//! Subscriber setup for the CLI.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "plugbridge.log";

/// How the CLI reports its tracing output.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Emit JSON lines on stderr instead of human-readable text.
    pub json: bool,
    /// Also write a daily-rolling log file into this directory.
    pub directory: Option<PathBuf>,
}

/// Install the global subscriber.
///
/// The level comes from `RUST_LOG`, defaulting to `info`. Keep the returned
/// guard alive for the life of the process or buffered file output is lost.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &options.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("failed to create log directory {}", directory.display())
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if options.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("failed to install tracing subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("failed to install tracing subscriber")?;
    }

    Ok(guard)
}
