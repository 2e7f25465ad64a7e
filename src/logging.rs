use anyhow::{Context, Result};
use redditfeed_core::LoggingConfig;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the file writer flushing; hold it until the program exits.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Console logging plus an optional plain-text log file. `RUST_LOG`
/// overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(&config.level))
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match config.file_path() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = config.file_path() {
        tracing::debug!("Logging to {}", path.display());
    }

    Ok(LogGuard { _file: guard })
}

fn default_filter(level: &str) -> String {
    format!("{},reqwest=warn,hyper=warn", level.trim().to_lowercase())
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
