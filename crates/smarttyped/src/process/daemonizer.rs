//! Detaching `smarttyped` from its controlling terminal.

use daemonize_me::Daemon;
use std::ffi::OsStr;
use thiserror::Error;

use smarttype_config::RuntimePaths;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background.
    ///
    /// # Errors
    ///
    /// Returns a [`DaemonizeError`] when the process cannot detach.
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// Forking or detaching from the terminal failed.
    #[error("failed to detach from the terminal: {0}")]
    Detach(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me`.
///
/// Telemetry is not yet installed when this runs, so it stays silent;
/// the launch sequence logs the detach once the subscriber is up.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        Daemon::new()
            .work_dir(paths.runtime_dir())
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        Ok(())
    }
}
