//! Daemon process lifecycle: singleton guard, daemonisation and launch
//! sequencing.

use std::time::Duration;

mod daemonizer;
mod errors;
mod guard;
mod launch;
mod liveness;

pub use daemonizer::{DaemonizeError, Daemonizer};
pub use errors::LaunchError;
pub use launch::{LaunchMode, LaunchPlan, ProcessControl, ServiceDeps, run_daemon, run_daemon_with};
pub(crate) use liveness::process_alive;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const FOREGROUND_ENV_VAR: &str = "SMARTTYPE_FOREGROUND";
pub(crate) const EVENT_LOOP_POLL: Duration = Duration::from_millis(200);
