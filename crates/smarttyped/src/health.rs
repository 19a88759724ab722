//! Structured health reporting for supervisor lifecycle events.

use std::sync::Arc;

use smarttype_config::Configuration;

use crate::supervisor::{SupervisorError, WorkerExit};
use crate::watcher::WatcherError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before a worker is spawned.
    fn worker_starting(&self);

    /// Invoked after a worker has been spawned.
    fn worker_started(&self, pid: u32);

    /// Invoked when Start finds the configuration disabled.
    fn worker_disabled(&self);

    /// Invoked when spawning a worker failed.
    fn worker_start_failed(&self, error: &SupervisorError);

    /// Invoked once a requested stop has been confirmed.
    fn worker_stopped(&self, pid: u32, exit: WorkerExit, forced: bool);

    /// Invoked when a worker exits without being asked to.
    fn worker_exited(&self, pid: u32, exit: WorkerExit);

    /// Invoked after a reload has been applied.
    fn reload_applied(&self, config: &Configuration);

    /// Invoked when a reload was rejected and the previous state kept.
    fn reload_failed(&self, error: &SupervisorError);

    /// Invoked when hot reload is unavailable.
    fn watcher_degraded(&self, error: &WatcherError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn worker_starting(&self) {
        (**self).worker_starting();
    }

    fn worker_started(&self, pid: u32) {
        (**self).worker_started(pid);
    }

    fn worker_disabled(&self) {
        (**self).worker_disabled();
    }

    fn worker_start_failed(&self, error: &SupervisorError) {
        (**self).worker_start_failed(error);
    }

    fn worker_stopped(&self, pid: u32, exit: WorkerExit, forced: bool) {
        (**self).worker_stopped(pid, exit, forced);
    }

    fn worker_exited(&self, pid: u32, exit: WorkerExit) {
        (**self).worker_exited(pid, exit);
    }

    fn reload_applied(&self, config: &Configuration) {
        (**self).reload_applied(config);
    }

    fn reload_failed(&self, error: &SupervisorError) {
        (**self).reload_failed(error);
    }

    fn watcher_degraded(&self, error: &WatcherError) {
        (**self).watcher_degraded(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn worker_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_starting",
            "starting worker"
        );
    }

    fn worker_started(&self, pid: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_started",
            pid,
            "worker started"
        );
    }

    fn worker_disabled(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_disabled",
            "configuration disables correction; worker not started"
        );
    }

    fn worker_start_failed(&self, error: &SupervisorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "worker_start_failed",
            error = %error,
            "worker failed to start"
        );
    }

    fn worker_stopped(&self, pid: u32, exit: WorkerExit, forced: bool) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_stopped",
            pid,
            exit = %exit,
            forced,
            "worker stopped"
        );
    }

    fn worker_exited(&self, pid: u32, exit: WorkerExit) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "worker_exited",
            pid,
            exit = %exit,
            "worker exited unexpectedly"
        );
    }

    fn reload_applied(&self, config: &Configuration) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reload_applied",
            enabled = config.enabled,
            applications = config.applications.len(),
            custom_typos = config.custom_typos.len(),
            "configuration reloaded"
        );
    }

    fn reload_failed(&self, error: &SupervisorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "reload_failed",
            error = %error,
            "reload rejected; keeping previous configuration"
        );
    }

    fn watcher_degraded(&self, error: &WatcherError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "watcher_degraded",
            error = %error,
            "configuration watcher unavailable; hot reload disabled"
        );
    }
}
