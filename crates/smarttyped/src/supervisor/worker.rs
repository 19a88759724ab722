//! Launching and controlling the worker process.
//!
//! The supervisor talks to the worker only through the [`WorkerLauncher`]
//! and [`WorkerHandle`] traits so the state machine can be exercised with
//! in-memory doubles. The production implementations spawn the correction
//! hook binary and signal it through `nix`.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use super::errors::SupervisorError;

/// Environment variable carrying the worker's log verbosity.
pub const WORKER_LOG_ENV: &str = "RUST_LOG";

/// Environment variable pointing the worker at the configuration document.
pub const WORKER_CONFIG_ENV: &str = "SMARTTYPE_CONFIG";

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, absent when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal number on Unix.
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// True for a zero exit code.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(formatter, "exit code {code}"),
            (None, Some(signal)) => write!(formatter, "signal {signal}"),
            (None, None) => formatter.write_str("unknown status"),
        }
    }
}

/// Exclusive handle on one live worker process.
pub trait WorkerHandle: Send {
    /// OS process id.
    fn pid(&self) -> u32;

    /// Asks the worker to exit gracefully.
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcibly kills the worker.
    fn kill(&mut self) -> io::Result<()>;

    /// Reports the exit status without blocking.
    fn try_wait(&mut self) -> io::Result<Option<WorkerExit>>;

    /// Blocks until the worker exits.
    fn wait(&mut self) -> io::Result<WorkerExit>;
}

/// Factory for worker processes.
pub trait WorkerLauncher: Send + Sync {
    /// Confirms a worker could be launched right now, without launching it.
    fn preflight(&self) -> Result<(), SupervisorError>;

    /// Spawns a new worker.
    fn launch(&self) -> Result<Box<dyn WorkerHandle>, SupervisorError>;
}

/// Launches the installed correction hook binary.
#[derive(Debug, Clone)]
pub struct SystemWorkerLauncher {
    candidates: Vec<PathBuf>,
    worker_log: String,
    config_path: PathBuf,
}

impl SystemWorkerLauncher {
    /// Builds a launcher that tries `candidates` in order.
    pub fn new(
        candidates: Vec<PathBuf>,
        worker_log: impl Into<String>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            candidates,
            worker_log: worker_log.into(),
            config_path: config_path.into(),
        }
    }

    fn resolve(&self) -> Result<&Path, SupervisorError> {
        resolve_worker_binary(&self.candidates)
    }
}

impl WorkerLauncher for SystemWorkerLauncher {
    fn preflight(&self) -> Result<(), SupervisorError> {
        self.resolve().map(|_| ())
    }

    fn launch(&self) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        let binary = self.resolve()?;
        let child = Command::new(binary)
            .env(WORKER_LOG_ENV, &self.worker_log)
            .env(WORKER_CONFIG_ENV, &self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;
        Ok(Box::new(ChildWorker { child }))
    }
}

/// Returns the first candidate that exists as a file.
///
/// # Errors
///
/// Returns [`SupervisorError::BinaryNotFound`] listing every candidate when
/// none exists.
pub fn resolve_worker_binary(candidates: &[PathBuf]) -> Result<&Path, SupervisorError> {
    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .map(PathBuf::as_path)
        .ok_or_else(|| SupervisorError::BinaryNotFound {
            searched: candidates.to_vec(),
        })
}

/// Worker backed by a real child process.
#[derive(Debug)]
pub struct ChildWorker {
    child: Child,
}

impl WorkerHandle for ChildWorker {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn terminate(&mut self) -> io::Result<()> {
        let pid = i32::try_from(self.child.id())
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        kill(Pid::from_raw(pid), Signal::SIGINT).map_err(io::Error::from)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn try_wait(&mut self) -> io::Result<Option<WorkerExit>> {
        self.child
            .try_wait()
            .map(|status| status.map(WorkerExit::from))
    }

    fn wait(&mut self) -> io::Result<WorkerExit> {
        self.child.wait().map(WorkerExit::from)
    }
}
