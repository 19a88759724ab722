//! Error types for control invocations against a running supervisor.

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Errors raised while executing control directives.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No live supervisor is recorded in the pid file.
    #[error("no running smarttyped instance found (pid file {pid_path:?})")]
    ProcessNotFound {
        /// Pid file that was consulted.
        pid_path: PathBuf,
    },
    /// The pid file exists but could not be read.
    #[error("failed to read pid file {path:?}: {source}")]
    ReadPid {
        /// Pid file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The pid file does not hold an integer.
    #[error("failed to parse pid file {path:?}: {source}")]
    ParsePid {
        /// Pid file path.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },
    /// The recorded pid cannot name a process.
    #[error("pid {pid} recorded in {path:?} is not a valid process id")]
    InvalidPid {
        /// Pid file path.
        path: PathBuf,
        /// Value found in the file.
        pid: u32,
    },
    /// Probing the recorded process failed for a reason other than absence.
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        /// Recorded supervisor pid.
        pid: u32,
        /// Errno returned by the probe.
        #[source]
        source: Errno,
    },
    /// Delivering the directive's signal failed.
    #[error("failed to signal supervisor pid {pid}: {source}")]
    Signal {
        /// Recorded supervisor pid.
        pid: u32,
        /// Errno returned by `kill`.
        #[source]
        source: Errno,
    },
    /// The supervisor was still alive when the stop deadline passed.
    #[error("supervisor shutdown did not complete within {timeout_ms} ms; check {pid_path:?}")]
    StopTimeout {
        /// Pid file that still names the supervisor.
        pid_path: PathBuf,
        /// Time waited, in milliseconds.
        timeout_ms: u64,
    },
    /// The health snapshot could not be read.
    #[error("failed to read health snapshot {path:?}: {source}")]
    ReadHealth {
        /// Health file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing directive output failed.
    #[error("failed to write control output: {0}")]
    Io(#[source] io::Error),
}
