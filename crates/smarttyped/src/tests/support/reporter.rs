//! Test double for [`HealthReporter`] that records structured events for
//! assertions.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use smarttype_config::Configuration;

use crate::health::HealthReporter;
use crate::supervisor::{SupervisorError, WorkerExit};
use crate::watcher::WatcherError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    WorkerStarting,
    WorkerStarted(u32),
    WorkerDisabled,
    WorkerStartFailed(String),
    WorkerStopped { pid: u32, forced: bool },
    WorkerExited(u32),
    ReloadApplied { min_word_length: u32 },
    ReloadFailed(String),
    WatcherDegraded(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
    obstruct_on_start: Mutex<Option<PathBuf>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Replaces `path` with a non-empty directory once a worker starts, so
    /// later writes to it fail.
    pub fn obstruct_after_start(&self, path: PathBuf) {
        *self
            .obstruct_on_start
            .lock()
            .expect("health reporter mutex poisoned") = Some(path);
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn worker_starting(&self) {
        self.record(HealthEvent::WorkerStarting);
    }

    fn worker_started(&self, pid: u32) {
        self.record(HealthEvent::WorkerStarted(pid));
        let obstruct = self
            .obstruct_on_start
            .lock()
            .expect("health reporter mutex poisoned")
            .take();
        if let Some(path) = obstruct {
            let _ = fs::remove_file(&path);
            fs::create_dir_all(&path).expect("obstructing directory");
            fs::write(path.join("occupied"), b"").expect("obstructing entry");
        }
    }

    fn worker_disabled(&self) {
        self.record(HealthEvent::WorkerDisabled);
    }

    fn worker_start_failed(&self, error: &SupervisorError) {
        self.record(HealthEvent::WorkerStartFailed(error.to_string()));
    }

    fn worker_stopped(&self, pid: u32, _exit: WorkerExit, forced: bool) {
        self.record(HealthEvent::WorkerStopped { pid, forced });
    }

    fn worker_exited(&self, pid: u32, _exit: WorkerExit) {
        self.record(HealthEvent::WorkerExited(pid));
    }

    fn reload_applied(&self, config: &Configuration) {
        self.record(HealthEvent::ReloadApplied {
            min_word_length: config.min_word_length,
        });
    }

    fn reload_failed(&self, error: &SupervisorError) {
        self.record(HealthEvent::ReloadFailed(error.to_string()));
    }

    fn watcher_degraded(&self, error: &WatcherError) {
        self.record(HealthEvent::WatcherDegraded(error.to_string()));
    }
}
