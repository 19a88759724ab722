//! Error surface of the worker supervisor.

use std::io;
use std::path::PathBuf;

use smarttype_config::ConfigError;
use thiserror::Error;

/// Errors surfaced by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The configuration document could not be loaded.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying store error.
        #[from]
        source: ConfigError,
    },
    /// No worker binary exists at any candidate location.
    #[error("worker binary not found (searched: {})", display_paths(.searched))]
    BinaryNotFound {
        /// Candidate paths, in lookup order.
        searched: Vec<PathBuf>,
    },
    /// Start was requested while a worker is alive.
    #[error("worker already running with pid {pid}")]
    AlreadyRunning {
        /// PID of the live worker.
        pid: u32,
    },
    /// Spawning the worker process failed.
    #[error("failed to spawn worker '{}': {source}", .binary.display())]
    Spawn {
        /// Binary that failed to launch.
        binary: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting for the worker to exit failed.
    #[error("failed to confirm exit of worker pid {pid}: {source}")]
    Wait {
        /// Worker PID.
        pid: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A previous operation panicked while holding the supervisor lock.
    #[error("supervisor state lock poisoned")]
    Poisoned,
}

impl SupervisorError {
    /// True for errors that leave the supervisor fully usable.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
