//! Logging setup for binaries embedding the library.
//!
//! The library itself only emits `tracing` events; installing a
//! subscriber is the binary's job so it can decide where output goes.
//! [`init`] logs to stderr, [`init_with_file`] additionally rotates a
//! daily log file so console progress bars stay readable while a full
//! record survives on disk.
//!
//! The filter honors `RUST_LOG` when set, falling back to the directive
//! the caller passes in.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr-only subscriber.
///
/// Does nothing when a subscriber is already installed, so tests and
/// repeated calls are safe.
pub fn init(default_filter: &str) {
    let filter = env_filter(default_filter);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Install a subscriber writing to stderr and a daily-rotated file under
/// `log_dir`.
///
/// The returned guard flushes the file writer; keep it alive for the
/// life of the process. Returns `None` when a subscriber was already
/// installed or the log directory could not be created.
pub fn init_with_file(default_filter: &str, log_dir: &Path) -> Option<WorkerGuard> {
    if std::fs::create_dir_all(log_dir).is_err() {
        init(default_filter);
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "dumpmill.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = env_filter(default_filter);
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .is_ok();

    installed.then_some(guard)
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_is_idempotent() {
        init("info");
        init("debug");
    }

    #[test]
    fn test_init_with_file_creates_log_dir() {
        let temp = TempDir::new().unwrap();
        let log_dir = temp.path().join("logs");

        // A subscriber may already be installed by another test; either
        // way the directory must exist afterwards.
        let _guard = init_with_file("info", &log_dir);
        assert!(log_dir.is_dir());
    }
}
