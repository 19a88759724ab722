//! Watches the configuration directory and turns bursts of file events
//! into single reload requests.
//!
//! The directory is watched rather than the file so editors that save by
//! renaming a temporary file over the original keep triggering events.
//! Events for other files in the directory are ignored.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use smarttype_config::parent_directory;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandSender};

const WATCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watcher");
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Errors raised while setting up the configuration watcher.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The configuration path has no parent directory to watch.
    #[error("configuration path '{}' has no parent directory", .path.display())]
    MissingParent {
        /// Configured path.
        path: PathBuf,
    },
    /// The directory to watch does not exist.
    #[error("configuration directory '{}' does not exist", .path.display())]
    MissingDirectory {
        /// Directory that was expected.
        path: PathBuf,
    },
    /// The platform watcher could not be created or attached.
    #[error("failed to watch '{}': {source}", .path.display())]
    Notify {
        /// Directory being watched.
        path: PathBuf,
        /// Underlying notify error.
        #[source]
        source: notify::Error,
    },
    /// The debounce thread could not be spawned.
    #[error("failed to spawn watcher thread: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Live watch on the configuration directory.
///
/// Dropping the value detaches the platform watcher and joins the
/// debounce thread.
pub struct FileWatcher {
    directory: PathBuf,
    watcher: Option<RecommendedWatcher>,
    shutdown: Arc<AtomicBool>,
    debounce: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FileWatcher")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts watching the directory containing `config_path`.
    ///
    /// Every change to the configuration file is coalesced with the
    /// changes that follow it until `debounce` passes without another
    /// one; then a single [`Command::Reload`] is sent.
    ///
    /// # Errors
    ///
    /// Returns a [`WatcherError`] when the directory cannot be watched.
    pub fn spawn(
        config_path: &Path,
        debounce: Duration,
        commands: CommandSender,
    ) -> Result<Self, WatcherError> {
        let directory = parent_directory(config_path)
            .ok_or_else(|| WatcherError::MissingParent {
                path: config_path.to_path_buf(),
            })?
            .to_path_buf();
        if !directory.is_dir() {
            return Err(WatcherError::MissingDirectory { path: directory });
        }
        let file_name = config_path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| WatcherError::MissingParent {
                path: config_path.to_path_buf(),
            })?;

        let (events_tx, events_rx) = mpsc::channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) if is_relevant(&event, &file_name) => {
                    debug!(target: WATCHER_TARGET, kind = ?event.kind, "configuration changed");
                    let _ = events_tx.send(());
                }
                Ok(_) => {}
                Err(error) => warn!(target: WATCHER_TARGET, error = %error, "watch error"),
            },
            notify::Config::default(),
        )
        .map_err(|source| WatcherError::Notify {
            path: directory.clone(),
            source,
        })?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Notify {
                path: directory.clone(),
                source,
            })?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let commands = commands.with_source("watcher");
        let handle = thread::Builder::new()
            .name("smarttyped-watcher".to_owned())
            .spawn(move || debounce_events(&events_rx, debounce, &commands, &flag))
            .map_err(|source| WatcherError::Thread { source })?;

        info!(
            target: WATCHER_TARGET,
            directory = %directory.display(),
            debounce_ms = debounce.as_millis(),
            "watching configuration directory"
        );
        Ok(Self {
            directory,
            watcher: Some(watcher),
            shutdown,
            debounce: Some(handle),
        })
    }

    /// Directory under watch.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.watcher.take();
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.debounce.take()
            && handle.join().is_err()
        {
            warn!(target: WATCHER_TARGET, "watcher thread panicked");
        }
        debug!(
            target: WATCHER_TARGET,
            directory = %self.directory.display(),
            "stopped watching configuration directory"
        );
    }
}

/// True when `event` creates or modifies the file called `file_name`.
pub(crate) fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_create() || event.kind.is_modify())
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

fn debounce_events(
    events: &Receiver<()>,
    quiet: Duration,
    commands: &CommandSender,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match events.recv_timeout(IDLE_POLL) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
        let mut coalesced = 1_u32;
        loop {
            match events.recv_timeout(quiet) {
                Ok(()) => coalesced = coalesced.saturating_add(1),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        debug!(target: WATCHER_TARGET, coalesced, "requesting reload");
        if !commands.send(Command::Reload) {
            return;
        }
    }
}
