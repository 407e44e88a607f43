//! provides logging helpers

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Directory for rotated log files; file logging is disabled when unset.
pub const LOG_PATH_ENV_VAR: &str = "CELL_LOG_PATH";

const LOG_FILE_PREFIX: &str = "cell-state";

/// initiate the global tracing subscriber
///
/// The returned guard must be held for the lifetime of the process, otherwise
/// buffered file log lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let stderr_layer = layer().with_writer(std::io::stderr).with_target(true);

    let log_path = env::var(LOG_PATH_ENV_VAR).ok();
    let appender = log_path.as_deref().map(|path| rolling_appender(Path::new(path)));

    let (file_layer, guard, appender_error) = match appender {
        Some(Ok(appender)) => {
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = layer().with_writer(file_writer).with_ansi(false);
            (Some(file_layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = appender_error {
        tracing::warn!(
            log_path = log_path.as_deref().unwrap_or_default(),
            "failed to create rolling file appender, logging to stderr only: {e}"
        );
    }

    guard
}

fn rolling_appender(
    dir: &Path,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(7)
        .build(dir)
}
