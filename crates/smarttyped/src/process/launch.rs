//! Sequences daemon startup, the supervision loop and orderly shutdown.

use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use smarttype_config::{ConfigStore, DaemonSettings, RuntimePaths};

use crate::commands::command_queue;
use crate::event_loop::run_event_loop;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::signals::{SignalSource, SystemSignals};
use crate::supervisor::{Supervisor, SystemWorkerLauncher, WorkerLauncher};
use crate::telemetry::{self, LogSink, TelemetryError};
use crate::watcher::FileWatcher;

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::{EVENT_LOOP_POLL, FOREGROUND_ENV_VAR, PROCESS_TARGET};

/// Launch mode for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal.
    Foreground,
}

impl LaunchMode {
    /// Chooses the mode for a `run` invocation.
    ///
    /// `--daemon` selects the background unless the foreground override
    /// variable is set.
    #[must_use]
    pub fn detect(daemon: bool) -> Self {
        if daemon && env::var_os(FOREGROUND_ENV_VAR).is_none() {
            Self::Background
        } else {
            Self::Foreground
        }
    }

    fn log_sink(self, paths: &RuntimePaths) -> LogSink {
        match self {
            Self::Background => LogSink::File(paths.log_path().to_path_buf()),
            Self::Foreground => LogSink::Stderr,
        }
    }
}

/// Process-level collaborators needed to control the daemon lifecycle.
pub struct ProcessControl<D, S> {
    /// Foreground or background.
    pub mode: LaunchMode,
    /// Backend used in background mode.
    pub daemonizer: D,
    /// Source of shutdown and reload signals.
    pub signals: S,
}

/// Service dependencies required to run the supervisor.
pub struct ServiceDeps<L, T> {
    /// Daemon runtime settings.
    pub settings: DaemonSettings,
    /// Worker process factory.
    pub launcher: L,
    /// Lifecycle observer.
    pub reporter: Arc<dyn HealthReporter>,
    /// Installs log output once the process has settled.
    pub telemetry: T,
}

/// Collaborators required to launch the daemon runtime.
pub struct LaunchPlan<L, T, D, S> {
    /// Process control.
    pub process: ProcessControl<D, S>,
    /// Services.
    pub services: ServiceDeps<L, T>,
}

/// Runs the supervisor using the production collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when startup fails; see [`run_daemon_with`].
pub fn run_daemon(settings: DaemonSettings, mode: LaunchMode) -> Result<(), LaunchError> {
    let settings = settings
        .anchor_relative_paths()
        .map_err(|source| LaunchError::ResolvePaths { source })?;
    let launcher = SystemWorkerLauncher::new(
        settings.worker_candidates(),
        settings.worker_log.clone(),
        settings.config_path(),
    );
    let plan = LaunchPlan {
        process: ProcessControl {
            mode,
            daemonizer: SystemDaemonizer::new(),
            signals: SystemSignals,
        },
        services: ServiceDeps {
            settings,
            launcher,
            reporter: Arc::new(StructuredHealthReporter::new()),
            telemetry: |settings: &DaemonSettings, sink: &LogSink| {
                telemetry::initialise(settings, sink).map(drop)
            },
        },
    };
    run_daemon_with(plan)
}

/// Runs the supervisor with injected collaborators.
///
/// Startup acquires the singleton lock, detaches when running in the
/// background, records the pid, installs signal routing, starts the worker
/// and attaches the configuration watcher, then hands control to the event
/// loop until a Shutdown command arrives.
///
/// # Errors
///
/// Returns a [`LaunchError`] when another supervisor is alive, runtime
/// files cannot be written, signal routing cannot be installed, or the
/// initial worker start fails. A watcher failure only disables hot reload.
pub fn run_daemon_with<L, T, D, S>(plan: LaunchPlan<L, T, D, S>) -> Result<(), LaunchError>
where
    L: WorkerLauncher,
    T: FnOnce(&DaemonSettings, &LogSink) -> Result<(), TelemetryError>,
    D: Daemonizer,
    S: SignalSource,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        signals,
    } = process;
    let ServiceDeps {
        settings,
        launcher,
        reporter,
        telemetry,
    } = services;

    let paths = RuntimePaths::from_settings(&settings)?;
    let mut guard = ProcessGuard::acquire(paths)?;
    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize(guard.paths())?;
    }
    telemetry(&settings, &mode.log_sink(guard.paths()))?;
    info!(
        target: PROCESS_TARGET,
        ?mode,
        config = %settings.config_path().display(),
        runtime = %guard.paths().runtime_dir().display(),
        "starting supervisor"
    );
    guard.write_pid(std::process::id())?;

    let supervisor = Supervisor::new(
        ConfigStore::new(settings.config_path()),
        launcher,
        settings.stop_timeout(),
        Arc::clone(&reporter),
    );
    let publish = |status: HealthState, supervisor: &Supervisor<L>| {
        guard.write_health(status, supervisor.state(), &supervisor.stats().snapshot())
    };
    publish(HealthState::Starting, &supervisor)?;

    let (sender, receiver) = command_queue();
    let signal_guard = signals.install(sender.clone())?;
    supervisor.start()?;
    let watcher = match FileWatcher::spawn(supervisor.config_path(), settings.debounce(), sender) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            reporter.watcher_degraded(&error);
            None
        }
    };
    publish(HealthState::Ready, &supervisor)?;

    let exit = run_event_loop(&supervisor, &receiver, EVENT_LOOP_POLL, |supervisor| {
        if let Err(error) = publish(HealthState::Ready, supervisor) {
            warn!(target: PROCESS_TARGET, error = %error, "failed to refresh health snapshot");
        }
    });
    drop(watcher);
    drop(signal_guard);
    publish(HealthState::Stopping, &supervisor)?;
    info!(
        target: PROCESS_TARGET,
        ?exit,
        "shutdown sequence completed"
    );
    Ok(())
}
