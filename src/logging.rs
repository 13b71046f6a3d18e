use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

/// File name prefix of the daily rolling log files.
const LOG_FILE_PREFIX: &str = "academy-sync.log";

/// Initialize the tracing subscriber for logging.
///
/// RUST_LOG takes precedence over the configured level. Logs always go to
/// stderr; when a directory is configured they are also appended to a daily
/// rolling file through a non-blocking writer. Hold on to the returned guard
/// until exit so buffered file lines get flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(&config.level)?;

  let (file_layer, guard) = match &config.directory {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_writer(writer).with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .with(filter)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn build_filter(default_level: &str) -> Result<EnvFilter> {
  EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(default_level))
    .map_err(|e| eyre!("Invalid log level '{}': {}", default_level, e))
}
