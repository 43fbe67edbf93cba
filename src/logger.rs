use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{LOGS_DIR, LOG_FILE_PREFIX};

const DEFAULT_FILTER: &str = "info";

/// Console output plus a daily rolling file in `logs_dir`.
/// The returned guard flushes the file writer when dropped, keep it alive in `main`.
pub fn init_logger(logs_dir: impl AsRef<Path>) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(fmt::layer().with_target(false).compact())
        .init();

    guard
}

pub fn init_default_logger() -> WorkerGuard {
    init_logger(LOGS_DIR)
}
