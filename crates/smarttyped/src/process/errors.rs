//! Defines the error surface for daemon launch and runtime sequencing.

use std::io;
use std::path::PathBuf;
use std::time::SystemTimeError;

use nix::errno::Errno;
use thiserror::Error;

use smarttype_config::RuntimePathsError;

use crate::signals::SignalError;
use crate::supervisor::SupervisorError;
use crate::telemetry::TelemetryError;

use super::daemonizer::DaemonizeError;

/// Errors surfaced while launching or running the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{}': {source}", .path.display())]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Relative path settings could not be anchored to the working
    /// directory.
    #[error("failed to resolve relative paths: {source}")]
    ResolvePaths {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{}': {source}", .path.display())]
    LockCreate {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A running supervisor already holds the lock.
    #[error("supervisor already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing pid file.
        pid: u32,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{}': {source}", .path.display())]
    Cleanup {
        /// Path of the artefact that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the pid file failed.
    #[error("failed to write pid file '{}': {source}", .path.display())]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the health snapshot failed.
    #[error("failed to write health snapshot '{}': {source}", .path.display())]
    HealthWrite {
        /// Health file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {source}")]
    HealthSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying clock error.
        #[source]
        source: SystemTimeError,
    },
    /// The health snapshot was requested before the pid was recorded.
    #[error("health snapshot requested before the pid file was written")]
    MissingPid,
    /// Probing an existing supervisor failed.
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        /// PID that was probed.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
    /// Detaching into the background failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemoniser error.
        #[source]
        source: DaemonizeError,
    },
    /// Installing telemetry failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Installing signal delivery failed.
    #[error("failed to install signal routing: {source}")]
    Signals {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
    /// The initial worker start failed.
    #[error("failed to start worker: {source}")]
    Supervisor {
        /// Underlying supervisor error.
        #[source]
        source: SupervisorError,
    },
}

impl From<RuntimePathsError> for LaunchError {
    fn from(source: RuntimePathsError) -> Self {
        match source {
            RuntimePathsError::RuntimeDirectory { path, source } => {
                Self::RuntimeDirectory { path, source }
            }
        }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}

impl From<SupervisorError> for LaunchError {
    fn from(source: SupervisorError) -> Self {
        Self::Supervisor { source }
    }
}
