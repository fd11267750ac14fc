//! # Local Logger
//!
//! Installs the process-wide `tracing` subscriber: a coloured console layer and
//! a JSON file layer written through a non-blocking appender. Each run logs to
//! its own timestamped file; older files of the same application are rotated
//! away at startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use glob::glob;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// # Logger Local Options
///
/// Controls where and how log events are written.
#[derive(Debug, Clone)]
pub struct LoggerLocalOptions {
    /// Print events to stdout.
    pub use_tty: bool,
    /// Write JSON events to a file in `log_dir`.
    pub use_file: bool,
    /// Directory for log files; created when missing.
    pub log_dir: PathBuf,
    /// Filter used when `RUST_LOG` is unset (e.g. `info`, `lib_common=debug`).
    pub level: String,
    /// Number of previous log files kept next to the new one.
    pub keep_files: usize,
}

impl Default for LoggerLocalOptions {
    fn default() -> Self {
        Self {
            use_tty: true,
            use_file: true,
            log_dir: PathBuf::from("./logs"),
            level: "info".to_string(),
            keep_files: 1,
        }
    }
}

/// Handle for the installed subscriber. Dropping it flushes and stops the file
/// writer, so keep it alive until the end of `main`.
pub struct LoggerLocal {
    current_log_file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LoggerLocal {
    /// Installs the global subscriber for `app_name`.
    ///
    /// # Errors
    /// Fails if the filter is invalid, the log directory cannot be created, or a
    /// global subscriber is already set.
    pub fn init(app_name: &str, options: LoggerLocalOptions) -> Result<Self> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&options.level))
            .with_context(|| format!("invalid log level '{}'", options.level))?;

        let console_layer = options
            .use_tty
            .then(|| fmt::layer().with_target(true).with_ansi(true));

        let mut guard = None;
        let mut current_log_file = None;
        let file_layer = if options.use_file {
            fs::create_dir_all(&options.log_dir).with_context(|| {
                format!("creating log directory {}", options.log_dir.display())
            })?;
            Self::rotate_logs(app_name, &options.log_dir, options.keep_files);

            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            let file_name = format!("{app_name}-{timestamp}.log");
            let (writer, worker_guard) = non_blocking(rolling::never(&options.log_dir, &file_name));

            guard = Some(worker_guard);
            current_log_file = Some(options.log_dir.join(file_name));
            Some(fmt::layer().with_ansi(false).with_writer(writer).json())
        } else {
            None
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .context("a global tracing subscriber is already installed")?;

        Ok(Self {
            current_log_file,
            _guard: guard,
        })
    }

    /// Path of the file this run writes to, if file logging is on.
    pub fn current_log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }

    /// Deletes all but the `keep` newest `{app_name}-*.log` files in `log_dir`.
    /// File names embed a sortable timestamp, so name order is age order.
    ///
    /// Returns the number of files removed.
    pub fn rotate_logs(app_name: &str, log_dir: &Path, keep: usize) -> usize {
        let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
        let mut log_files: Vec<PathBuf> = match glob(&pattern) {
            Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
            Err(e) => {
                eprintln!("Invalid log rotation pattern {pattern}: {e}");
                return 0;
            }
        };

        // Newest first
        log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        let mut removed = 0;
        for old_file in log_files.iter().skip(keep) {
            match fs::remove_file(old_file) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_newest_files_of_the_app_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "generate_data-20240101_000000.log",
            "generate_data-20240301_000000.log",
            "generate_data-20240201_000000.log",
            "other-20230101_000000.log",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let removed = LoggerLocal::rotate_logs("generate_data", dir.path(), 1);
        assert_eq!(removed, 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "generate_data-20240301_000000.log".to_string(),
                "notes.txt".to_string(),
                "other-20230101_000000.log".to_string(),
            ]
        );
    }

    #[test]
    fn rotation_in_empty_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(LoggerLocal::rotate_logs("app", dir.path(), 0), 0);
    }
}
