//! Supervisor daemon for the SmartType text-correction worker.
//!
//! `smarttyped` keeps exactly one correction worker process alive while
//! the configuration enables it. It reloads the worker when the YAML
//! configuration file changes or when it receives SIGHUP, and shuts down
//! cleanly on SIGTERM, SIGINT or SIGQUIT.
//!
//! Every request, whatever its origin, becomes a [`Command`] on a single
//! queue consumed by one event loop. The [`Supervisor`] serialises Start,
//! Stop and Reload under one lock, so a reload that arrives while another
//! is still waiting for the old worker to exit is queued rather than
//! raced. Lifecycle events are surfaced through a [`HealthReporter`] and a
//! JSON health snapshot in the runtime directory, which the `status`,
//! `stop` and `reload` subcommands use to address a running instance.

mod cli;
mod commands;
mod control;
mod event_loop;
mod health;
mod process;
mod signals;
mod stats;
mod supervisor;
mod telemetry;
mod watcher;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use smarttype_config::RuntimePaths;

pub use commands::{Command, CommandReceiver, CommandSender, command_queue};
pub use control::{ControlDirective, ControlError};
pub use event_loop::{EventLoopExit, run_event_loop};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, LaunchPlan, ProcessControl, ServiceDeps,
    run_daemon, run_daemon_with,
};
pub use signals::{SignalError, SignalRouter, SignalSource, SystemSignals, command_for_signal};
pub use stats::{StatsRegistry, StatsSnapshot};
pub use supervisor::{
    ReloadOutcome, StartOutcome, Supervisor, SupervisorError, SystemWorkerLauncher,
    WORKER_CONFIG_ENV, WORKER_LOG_ENV, WorkerExit, WorkerHandle, WorkerLauncher, WorkerState,
};
pub use telemetry::{LogSink, TelemetryError, TelemetryHandle};
pub use watcher::{FileWatcher, WatcherError};

use cli::{Cli, CliCommand};

/// Runs the binary with the provided arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render().to_string();
            let _ = if error.use_stderr() {
                write!(stderr, "{rendered}")
            } else {
                write!(stdout, "{rendered}")
            };
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1));
        }
    };
    let command = cli.command.unwrap_or(CliCommand::Run { daemon: false });
    match command.directive() {
        Some(directive) => {
            let paths = RuntimePaths::from_settings_readonly(&cli.settings);
            match control::execute(directive, &paths, stdout) {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    let _ = writeln!(stderr, "smarttyped: {error}");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            let daemon = matches!(command, CliCommand::Run { daemon: true });
            match run_daemon(cli.settings, LaunchMode::detect(daemon)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    let _ = writeln!(stderr, "smarttyped: {error}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
