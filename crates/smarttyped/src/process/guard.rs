use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use smarttype_config::{RuntimePaths, atomic_write};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::liveness::{process_alive, read_pid};
use crate::stats::StatsSnapshot;
use crate::supervisor::WorkerState;

const RUNTIME_FILE_MODE: u32 = 0o600;

/// Holds the singleton lock and owns the runtime artefacts.
///
/// The lock, pid and health files are removed when the guard drops.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(RUNTIME_FILE_MODE);
        }
        let path = self.paths.pid_path();
        let pid_error = |source| LaunchError::PidWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut file = options.open(path).map_err(pid_error)?;
        writeln!(file, "{pid}").map_err(pid_error)?;
        file.sync_all().map_err(pid_error)?;
        self.pid = Some(pid);
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    pub(super) fn write_health(
        &self,
        status: HealthState,
        worker: WorkerState,
        stats: &StatsSnapshot,
    ) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let path = self.paths.health_path();
        let snapshot = HealthSnapshot::new(status, pid, worker, stats)?;
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        atomic_write(path, &payload, RUNTIME_FILE_MODE).map_err(|source| {
            LaunchError::HealthWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(
            target: PROCESS_TARGET,
            status = snapshot.status,
            worker_state = snapshot.worker_state,
            file = %path.display(),
            "health snapshot updated"
        );
        Ok(())
    }

    pub(super) fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, label) in [
            (self.paths.health_path(), "health"),
            (self.paths.pid_path(), "pid"),
            (self.paths.lock_path(), "lock"),
        ] {
            match fs::remove_file(path) {
                Err(error) if error.kind() != io::ErrorKind::NotFound => {
                    warn!(
                        target: PROCESS_TARGET,
                        file = %path.display(),
                        error = %error,
                        "failed to remove {label} file"
                    );
                }
                _ => {}
            }
        }
    }
}

/// Daemon-level status published in the health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Runtime files are in place; the worker is not yet started.
    Starting,
    /// The event loop is accepting commands.
    Ready,
    /// Shutdown is in progress.
    Stopping,
}

impl HealthState {
    /// Lower-case label written to the snapshot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
    worker_state: &'static str,
    worker_pid: Option<u32>,
    uptime_secs: u64,
    reloads: u64,
    failed_reloads: u64,
    last_reload: Option<u64>,
    worker_starts: u64,
    worker_exits: u64,
}

impl HealthSnapshot {
    fn new(
        state: HealthState,
        pid: u32,
        worker: WorkerState,
        stats: &StatsSnapshot,
    ) -> Result<Self, LaunchError> {
        let timestamp = unix_seconds(SystemTime::now())?;
        let last_reload = stats.last_reload.map(unix_seconds).transpose()?;
        Ok(Self {
            status: state.as_str(),
            pid,
            timestamp,
            worker_state: worker.as_str(),
            worker_pid: stats.current_worker_pid,
            uptime_secs: stats.uptime.as_secs(),
            reloads: stats.reloads,
            failed_reloads: stats.failed_reloads,
            last_reload,
            worker_starts: stats.worker_starts,
            worker_exits: stats.worker_exits,
        })
    }
}

fn unix_seconds(time: SystemTime) -> Result<u64, LaunchError> {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|source| LaunchError::Clock { source })
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(RUNTIME_FILE_MODE);
    }
    match options.open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %paths.lock_path().display(),
                "acquired supervisor lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        match process_alive(pid) {
            Ok(true) => {
                info!(
                    target: PROCESS_TARGET,
                    pid,
                    "refusing to start: existing supervisor alive"
                );
                return Err(LaunchError::AlreadyRunning { pid });
            }
            Ok(false) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid,
                    "existing supervisor not detected; cleaning stale files"
                );
            }
            Err(source) => return Err(LaunchError::CheckProcess { pid, source }),
        }
    }
    remove_file(paths.lock_path())?;
    remove_file(paths.pid_path())?;
    remove_file(paths.health_path())?;
    acquire_lock(paths)
}

fn remove_file(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
