//! Worker lifecycle state machine.
//!
//! [`Supervisor`] owns the only handle to the worker process. Start, Stop
//! and Reload each run to completion under one operation lock, including
//! the blocking wait for a stopping worker to exit, so two requests can
//! never interleave and orphan a process. The current [`WorkerState`] is
//! published separately so it can be read while an operation is in
//! flight.
//!
//! Reload validates before it disturbs anything: the new document is
//! loaded and the worker binary resolved while the old worker keeps
//! running. Only then is the old worker stopped (exit confirmed) and the
//! replacement spawned, so at most one worker exists at any instant.

mod errors;
mod worker;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use smarttype_config::{ConfigStore, Configuration};
use tracing::{debug, error, info, warn};

use crate::health::HealthReporter;
use crate::stats::StatsRegistry;

pub use errors::SupervisorError;
pub use worker::{
    SystemWorkerLauncher, WORKER_CONFIG_ENV, WORKER_LOG_ENV, WorkerExit, WorkerHandle,
    WorkerLauncher,
};

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Observable lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// No worker exists.
    Stopped,
    /// A worker is being spawned.
    Starting,
    /// A worker is alive.
    Running,
    /// A worker has been asked to exit and is being waited on.
    Stopping,
}

impl WorkerState {
    /// Lower-case label used in logs and the health snapshot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Result of a successful Start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker was spawned.
    Started {
        /// PID of the new worker.
        pid: u32,
    },
    /// The configuration disables correction; nothing was spawned.
    Disabled,
}

/// Result of a successful Reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A worker is running with the new configuration.
    Restarted {
        /// PID of the replacement worker.
        pid: u32,
    },
    /// The new configuration disables correction; no worker is running.
    Disabled,
}

#[derive(Default)]
struct Slot {
    worker: Option<Box<dyn WorkerHandle>>,
    config: Option<Configuration>,
}

/// Owns the worker process and serialises every lifecycle operation.
pub struct Supervisor<L> {
    store: ConfigStore,
    launcher: L,
    stop_timeout: Duration,
    reporter: Arc<dyn HealthReporter>,
    stats: Arc<StatsRegistry>,
    slot: Mutex<Slot>,
    state: Mutex<WorkerState>,
}

impl<L> fmt::Debug for Supervisor<L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Supervisor")
            .field("config_path", &self.store.path())
            .field("stop_timeout", &self.stop_timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<L> Supervisor<L>
where
    L: WorkerLauncher,
{
    /// Builds a supervisor in the `Stopped` state.
    pub fn new(
        store: ConfigStore,
        launcher: L,
        stop_timeout: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            store,
            launcher,
            stop_timeout,
            reporter,
            stats: Arc::new(StatsRegistry::new()),
            slot: Mutex::new(Slot::default()),
            state: Mutex::new(WorkerState::Stopped),
        }
    }

    /// Loads the configuration and spawns a worker if it is enabled.
    ///
    /// A worker that has already exited but was not yet reaped is released
    /// first, so it does not block the new one.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] when a worker is alive,
    /// [`SupervisorError::Config`] when the document cannot be loaded, and
    /// [`SupervisorError::BinaryNotFound`] or [`SupervisorError::Spawn`]
    /// when the worker cannot be launched. The state stays `Stopped` on
    /// every failure.
    pub fn start(&self) -> Result<StartOutcome, SupervisorError> {
        let mut slot = self.lock_slot()?;
        self.release_if_exited(&mut slot);
        if let Some(worker) = slot.worker.as_ref() {
            let pid = worker.pid();
            info!(
                target: SUPERVISOR_TARGET,
                pid,
                "start rejected: worker already running"
            );
            return Err(SupervisorError::AlreadyRunning { pid });
        }
        let config = self.store.load()?;
        let enabled = config.enabled;
        slot.config = Some(config);
        if !enabled {
            self.reporter.worker_disabled();
            return Ok(StartOutcome::Disabled);
        }
        self.spawn_locked(&mut slot)
            .map(|pid| StartOutcome::Started { pid })
    }

    /// Replaces the configuration with the on-disk document and restarts
    /// the worker to match it.
    ///
    /// The document and the worker binary are validated first; if either
    /// is unusable the running worker and the previous configuration are
    /// left untouched. A reload only counts as applied once the
    /// replacement worker is running, or the new document disables it.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Config`] or
    /// [`SupervisorError::BinaryNotFound`] when validation fails, or a
    /// spawn/wait error when the swap itself fails.
    pub fn reload(&self) -> Result<ReloadOutcome, SupervisorError> {
        let mut slot = self.lock_slot()?;
        let result = self
            .validate_replacement()
            .and_then(|config| self.swap_locked(&mut slot, config));
        match result {
            Ok(outcome) => {
                self.stats.record_reload();
                if let Some(config) = slot.config.as_ref() {
                    self.reporter.reload_applied(config);
                }
                Ok(outcome)
            }
            Err(error) => {
                self.stats.record_failed_reload();
                self.reporter.reload_failed(&error);
                Err(error)
            }
        }
    }

    fn validate_replacement(&self) -> Result<Configuration, SupervisorError> {
        let config = self.store.load()?;
        if config.enabled {
            self.launcher.preflight()?;
        }
        Ok(config)
    }

    fn swap_locked(
        &self,
        slot: &mut Slot,
        config: Configuration,
    ) -> Result<ReloadOutcome, SupervisorError> {
        self.stop_locked(slot)?;
        let enabled = config.enabled;
        slot.config = Some(config);
        if !enabled {
            self.reporter.worker_disabled();
            return Ok(ReloadOutcome::Disabled);
        }
        self.spawn_locked(slot)
            .map(|pid| ReloadOutcome::Restarted { pid })
    }

    fn spawn_locked(&self, slot: &mut Slot) -> Result<u32, SupervisorError> {
        self.set_state(WorkerState::Starting);
        self.reporter.worker_starting();
        match self.launcher.launch() {
            Ok(worker) => {
                let pid = worker.pid();
                slot.worker = Some(worker);
                self.set_state(WorkerState::Running);
                self.stats.record_worker_started(pid);
                self.reporter.worker_started(pid);
                Ok(pid)
            }
            Err(error) => {
                self.set_state(WorkerState::Stopped);
                self.reporter.worker_start_failed(&error);
                Err(error)
            }
        }
    }
}

impl<L> Supervisor<L> {
    /// Current lifecycle state. Never waits for an in-flight operation.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statistics recorded by this supervisor.
    #[must_use]
    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    /// Location of the supervised configuration document.
    #[must_use]
    pub fn config_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Copy of the configuration last accepted by Start or Reload.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Poisoned`] if an operation panicked.
    pub fn current_config(&self) -> Result<Option<Configuration>, SupervisorError> {
        Ok(self.lock_slot()?.config.clone())
    }

    /// Stops the worker, returning once its exit has been confirmed.
    ///
    /// A worker that ignores the graceful request for longer than the stop
    /// timeout is killed. Stopping an already stopped supervisor is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Wait`] when the exit could not be
    /// confirmed even after a kill. The handle is then kept, so the worker
    /// still counts as live.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        let mut slot = self.lock_slot()?;
        self.stop_locked(&mut slot)
    }

    /// Releases the handle of a worker that exited on its own.
    ///
    /// Returns the exit status when the worker was found dead. Does not
    /// respawn; the next Start or Reload will.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Poisoned`] if an operation panicked.
    pub fn reap(&self) -> Result<Option<WorkerExit>, SupervisorError> {
        let mut slot = self.lock_slot()?;
        Ok(self.release_if_exited(&mut slot))
    }

    fn release_if_exited(&self, slot: &mut Slot) -> Option<WorkerExit> {
        let worker = slot.worker.as_mut()?;
        let pid = worker.pid();
        match worker.try_wait() {
            Ok(Some(exit)) => {
                slot.worker = None;
                self.set_state(WorkerState::Stopped);
                self.stats.record_worker_exited();
                self.reporter.worker_exited(pid, exit);
                Some(exit)
            }
            Ok(None) => None,
            Err(error) => {
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid,
                    error = %error,
                    "failed to poll worker status"
                );
                None
            }
        }
    }

    fn stop_locked(&self, slot: &mut Slot) -> Result<(), SupervisorError> {
        let Some(mut worker) = slot.worker.take() else {
            return Ok(());
        };
        let pid = worker.pid();
        self.set_state(WorkerState::Stopping);
        info!(target: SUPERVISOR_TARGET, pid, "stopping worker");
        if let Err(error) = worker.terminate() {
            // The worker may already be gone; the wait below decides.
            debug!(
                target: SUPERVISOR_TARGET,
                pid,
                error = %error,
                "graceful stop request failed"
            );
        }
        match self.await_exit(worker.as_mut()) {
            Ok((exit, forced)) => {
                self.set_state(WorkerState::Stopped);
                self.stats.record_worker_stopped();
                self.reporter.worker_stopped(pid, exit, forced);
                Ok(())
            }
            Err(source) => {
                error!(
                    target: SUPERVISOR_TARGET,
                    pid,
                    error = %source,
                    "worker exit could not be confirmed; keeping its handle"
                );
                slot.worker = Some(worker);
                self.set_state(WorkerState::Running);
                Err(SupervisorError::Wait { pid, source })
            }
        }
    }

    fn await_exit(
        &self,
        worker: &mut dyn WorkerHandle,
    ) -> Result<(WorkerExit, bool), std::io::Error> {
        let deadline = Instant::now() + self.stop_timeout;
        loop {
            match worker.try_wait() {
                Ok(Some(exit)) => return Ok((exit, false)),
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        target: SUPERVISOR_TARGET,
                        pid = worker.pid(),
                        error = %error,
                        "failed to poll stopping worker; escalating"
                    );
                    break;
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid = worker.pid(),
                    timeout_ms = self.stop_timeout.as_millis(),
                    "worker ignored stop request; killing"
                );
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        if let Err(error) = worker.kill() {
            debug!(
                target: SUPERVISOR_TARGET,
                pid = worker.pid(),
                error = %error,
                "kill failed"
            );
        }
        worker.wait().map(|exit| (exit, true))
    }

    fn set_state(&self, state: WorkerState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!(
                target: SUPERVISOR_TARGET,
                from = %*current,
                to = %state,
                "worker state changed"
            );
            *current = state;
        }
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, Slot>, SupervisorError> {
        self.slot.lock().map_err(|_| SupervisorError::Poisoned)
    }
}

impl<L> Drop for Supervisor<L> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.worker.is_none() {
            return;
        }
        warn!(
            target: SUPERVISOR_TARGET,
            "supervisor dropped with a live worker; stopping it"
        );
        if let Err(error) = self.stop_locked(&mut slot) {
            error!(
                target: SUPERVISOR_TARGET,
                error = %error,
                "failed to stop worker on drop"
            );
        }
    }
}
