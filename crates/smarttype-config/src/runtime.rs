//! Derives runtime artefact paths shared by the daemon and its control
//! surface.
//!
//! The runtime directory houses the daemon lock, pid record, health
//! snapshot and background log. A `smarttyped stop` invocation must agree
//! with the running daemon on this layout to find the pid record.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::DaemonSettings;

#[cfg(unix)]
const RUNTIME_DIR_MODE: u32 = 0o700;

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
    log_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the settings, creating the directory
    /// (owner-only on Unix) when missing.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimePathsError::RuntimeDirectory`] when the directory
    /// cannot be created.
    pub fn from_settings(settings: &DaemonSettings) -> Result<Self, RuntimePathsError> {
        let paths = Self::from_settings_readonly(settings);
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(RUNTIME_DIR_MODE);
        }
        builder.create(&paths.runtime_dir).map_err(|source| {
            RuntimePathsError::RuntimeDirectory {
                path: paths.runtime_dir.clone(),
                source,
            }
        })?;
        Ok(paths)
    }

    /// Derives runtime paths without touching the filesystem.
    #[must_use]
    pub fn from_settings_readonly(settings: &DaemonSettings) -> Self {
        Self::in_dir(settings.runtime_dir())
    }

    fn in_dir(runtime_dir: PathBuf) -> Self {
        Self {
            lock_path: runtime_dir.join("smarttyped.lock"),
            pid_path: runtime_dir.join("smarttyped.pid"),
            health_path: runtime_dir.join("smarttyped.health"),
            log_path: runtime_dir.join("smarttyped.log"),
            runtime_dir,
        }
    }

    /// Directory holding runtime artefacts.
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID record used by the control surface.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the health snapshot.
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }

    /// Path to the log file used in background mode.
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{}': {source}", .path.display())]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
