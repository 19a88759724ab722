//! Out-of-process control of a running supervisor.
//!
//! A control invocation finds the supervisor through the pid record in the
//! runtime directory and talks to it only with signals: SIGTERM to stop and
//! SIGHUP to reload.

mod error;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::info;

use smarttype_config::RuntimePaths;

use crate::process::process_alive;

pub use error::ControlError;

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");
const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Request sent to a running supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDirective {
    /// Ask the supervisor to shut down and wait until it has.
    Stop,
    /// Ask the supervisor to reload its configuration.
    Reload,
    /// Print the supervisor's health snapshot.
    Status,
}

/// Executes `directive` against the supervisor recorded in `paths`.
///
/// # Errors
///
/// Returns [`ControlError::ProcessNotFound`] when no pid is recorded or the
/// recorded process is gone, and other [`ControlError`] variants when the
/// record is unreadable, signalling fails, or shutdown does not complete.
pub fn execute<W: Write>(
    directive: ControlDirective,
    paths: &RuntimePaths,
    out: &mut W,
) -> Result<(), ControlError> {
    match directive {
        ControlDirective::Stop => stop(paths, STOP_TIMEOUT, out),
        ControlDirective::Reload => reload(paths, out),
        ControlDirective::Status => status(paths, out),
    }
}

fn stop<W: Write>(paths: &RuntimePaths, timeout: Duration, out: &mut W) -> Result<(), ControlError> {
    let pid = locate(paths)?;
    send(pid, Signal::SIGTERM)?;
    wait_for_shutdown(paths, pid, timeout)?;
    writeln!(out, "smarttyped (pid {pid}) stopped").map_err(ControlError::Io)
}

fn reload<W: Write>(paths: &RuntimePaths, out: &mut W) -> Result<(), ControlError> {
    let pid = locate(paths)?;
    send(pid, Signal::SIGHUP)?;
    writeln!(out, "reload requested for smarttyped (pid {pid})").map_err(ControlError::Io)
}

fn status<W: Write>(paths: &RuntimePaths, out: &mut W) -> Result<(), ControlError> {
    locate(paths)?;
    let path = paths.health_path();
    let snapshot = fs::read_to_string(path).map_err(|source| ControlError::ReadHealth {
        path: path.to_path_buf(),
        source,
    })?;
    out.write_all(snapshot.as_bytes()).map_err(ControlError::Io)?;
    if !snapshot.ends_with('\n') {
        out.write_all(b"\n").map_err(ControlError::Io)?;
    }
    Ok(())
}

/// Returns the pid of a live supervisor.
fn locate(paths: &RuntimePaths) -> Result<u32, ControlError> {
    let pid_path = paths.pid_path();
    let pid = match read_pid_record(pid_path)? {
        Some(pid) => pid,
        None => {
            return Err(ControlError::ProcessNotFound {
                pid_path: pid_path.to_path_buf(),
            });
        }
    };
    if i32::try_from(pid).is_err() || pid == 0 {
        return Err(ControlError::InvalidPid {
            path: pid_path.to_path_buf(),
            pid,
        });
    }
    match process_alive(pid) {
        Ok(true) => Ok(pid),
        Ok(false) => {
            info!(target: CONTROL_TARGET, pid, "recorded supervisor is not running");
            Err(ControlError::ProcessNotFound {
                pid_path: pid_path.to_path_buf(),
            })
        }
        Err(source) => Err(ControlError::CheckProcess { pid, source }),
    }
}

fn read_pid_record(path: &Path) -> Result<Option<u32>, ControlError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ControlError::ReadPid {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    content
        .trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|source| ControlError::ParsePid {
            path: path.to_path_buf(),
            source,
        })
}

fn send(pid: u32, signal: Signal) -> Result<(), ControlError> {
    let raw = i32::try_from(pid).map_err(|_| ControlError::Signal {
        pid,
        source: nix::errno::Errno::EINVAL,
    })?;
    kill(Pid::from_raw(raw), signal).map_err(|source| ControlError::Signal { pid, source })?;
    info!(target: CONTROL_TARGET, pid, signal = %signal, "signal sent");
    Ok(())
}

/// Waits until the pid record is removed or the process is gone.
fn wait_for_shutdown(paths: &RuntimePaths, pid: u32, timeout: Duration) -> Result<(), ControlError> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !paths.pid_path().exists() || !process_alive(pid).unwrap_or(true) {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL.min(timeout));
    }
    Err(ControlError::StopTimeout {
        pid_path: paths.pid_path().to_path_buf(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })
}
