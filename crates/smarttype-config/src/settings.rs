//! Runtime settings for the supervisor daemon itself.
//!
//! These are distinct from the [`Configuration`](crate::Configuration)
//! document: they control where the daemon looks for files and how it
//! behaves, and are supplied on the command line rather than read from the
//! watched file.

use std::io;
use std::path::{self, Path, PathBuf};
use std::time::Duration;

use clap::Args;

use crate::defaults::{
    DEFAULT_DEBOUNCE, DEFAULT_LOG_FILTER, DEFAULT_STOP_TIMEOUT, DEFAULT_WORKER_LOG,
    FALLBACK_WORKER_PATH, INSTALLED_WORKER_PATH, default_config_path, default_runtime_dir,
};
use crate::logging::LogFormat;

/// Settings shared by every `smarttyped` invocation.
#[derive(Debug, Clone, Args)]
pub struct DaemonSettings {
    /// Path of the configuration document to supervise.
    #[arg(long = "config", value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Directory holding the lock, pid, health and log files.
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,

    /// Tracing filter expression for the daemon's own logs.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Output format for the daemon's own logs.
    #[arg(long, default_value_t = LogFormat::default())]
    pub log_format: LogFormat,

    /// Explicit worker binary, bypassing installed and fallback lookup.
    #[arg(long, value_name = "PATH")]
    pub worker_binary: Option<PathBuf>,

    /// Value passed to the worker as `RUST_LOG`.
    #[arg(long, default_value = DEFAULT_WORKER_LOG)]
    pub worker_log: String,

    /// Grace period for a worker to exit before it is killed.
    #[arg(long, default_value_t = duration_millis(DEFAULT_STOP_TIMEOUT))]
    pub stop_timeout_ms: u64,

    /// Quiet window used to coalesce configuration file events.
    #[arg(long, default_value_t = duration_millis(DEFAULT_DEBOUNCE))]
    pub debounce_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            runtime_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: LogFormat::default(),
            worker_binary: None,
            worker_log: DEFAULT_WORKER_LOG.to_owned(),
            stop_timeout_ms: duration_millis(DEFAULT_STOP_TIMEOUT),
            debounce_ms: duration_millis(DEFAULT_DEBOUNCE),
        }
    }
}

impl DaemonSettings {
    /// Rewrites relative path settings against the current directory.
    ///
    /// Background mode changes the working directory, so paths given on
    /// the command line are anchored before launch.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised while reading the current directory.
    pub fn anchor_relative_paths(mut self) -> io::Result<Self> {
        for path in [
            &mut self.config_path,
            &mut self.runtime_dir,
            &mut self.worker_binary,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = path::absolute(&*path)?;
            }
        }
        Ok(self)
    }

    /// Resolved configuration document path.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(default_config_path)
    }

    /// Resolved runtime directory.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.runtime_dir.clone().unwrap_or_else(default_runtime_dir)
    }

    /// Candidate worker binaries in lookup order.
    #[must_use]
    pub fn worker_candidates(&self) -> Vec<PathBuf> {
        match &self.worker_binary {
            Some(path) => vec![path.clone()],
            None => vec![
                Path::new(INSTALLED_WORKER_PATH).to_path_buf(),
                Path::new(FALLBACK_WORKER_PATH).to_path_buf(),
            ],
        }
    }

    /// Grace period before a stopping worker is killed.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Debounce window for configuration file events.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
