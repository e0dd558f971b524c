//! Logging initialization with optional file-based daily rotation.

use std::path::Path;

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "detach.log";

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber.
///
/// - `to_file=true` → daily rotating file appender with non-blocking writer
/// - `to_file=false` → stderr output (default)
///
/// Returns an `Option<WorkerGuard>` that **must be held** for the lifetime of
/// the application to ensure buffered logs are flushed on shutdown.
///
/// The non-blocking writer runs on its own thread, so in a daemon call this
/// only after daemonizing.
pub fn init_logging(level: &str, to_file: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = env_filter(level);

    if to_file {
        let dir = log_dir.unwrap_or(Path::new("./logs"));
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();

        None
    }
}

/// A synchronous stderr subscriber for use before (and during)
/// daemonization, when no background writer thread may exist yet.
pub fn stderr_dispatch(level: &str) -> Dispatch {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .finish();
    Dispatch::new(subscriber)
}
