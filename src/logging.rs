//! Diagnostic tracing for the orchestrator.
//!
//! - **Tracing (this module)**: `RUST_LOG`-filtered diagnostics, written
//!   compactly to stderr and, once the project directory is known, appended to
//!   `.tandem/logs/tandem.log`.
//! - **Run artifacts** (`orchestrator::persist`): transcripts, attempt logs
//!   and state. Always written, unaffected by `RUST_LOG`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name of the diagnostic log inside the log directory.
pub const LOG_FILE_NAME: &str = "tandem.log";

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "info" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, or `info` with `--verbose`. When
/// `log_dir` is given a non-blocking file layer is added; keep the returned
/// guard alive until exit so buffered lines are flushed.
///
/// ```bash
/// RUST_LOG=tandem=debug tandem run --dry-run --auto
/// ```
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).compact();

    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
        Some(tracing_appender::non_blocking(appender))
    });

    match file {
        Some((writer, guard)) => {
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            // A second init (tests, repeated calls) keeps the first subscriber.
            let _ = tracing_subscriber::registry()
                .with(filter(verbose))
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter(verbose))
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}
