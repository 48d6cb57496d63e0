//! File logging.
//!
//! The terminal belongs to the UI, so log output only ever goes to a file.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{EnvConfig, DEFAULT_LOG_FILTER};

/// Keeps the background writer alive; drop it to flush and stop logging.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_file: PathBuf,
}

impl LoggingGuard {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// Installs the global subscriber.
///
/// Returns `None` when no log file is configured, the directory cannot be
/// created, or another subscriber is already installed.
pub fn init(config: &EnvConfig) -> Option<LoggingGuard> {
    let log_file = PathBuf::from(config.log_file.as_deref()?);
    let (dir, file_name) = split_log_path(&log_file)?;
    std::fs::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true),
    );
    if subscriber.try_init().is_err() {
        return None;
    }

    tracing::info!(log_file = %log_file.display(), "tracing initialized");
    Some(LoggingGuard {
        _guard: guard,
        log_file,
    })
}

fn split_log_path(path: &Path) -> Option<(PathBuf, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, file_name))
}
