//! Single consumer of the command queue.
//!
//! Commands are applied one at a time in arrival order. Between commands
//! the loop polls the worker so an unexpected exit is noticed and recorded
//! even when nothing is being requested.

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::commands::{Command, CommandReceiver};
use crate::supervisor::{Supervisor, SupervisorError, WorkerLauncher};

const LOOP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::event_loop");

/// Why the event loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoopExit {
    /// A Shutdown command was processed.
    Shutdown,
    /// Every producer hung up.
    Disconnected,
}

/// Applies commands to `supervisor` until shutdown.
///
/// `on_change` runs after every command and after a worker exit is
/// reaped, so callers can republish derived state. The worker is stopped
/// before this returns.
pub fn run_event_loop<L, F>(
    supervisor: &Supervisor<L>,
    commands: &CommandReceiver,
    poll: Duration,
    mut on_change: F,
) -> EventLoopExit
where
    L: WorkerLauncher,
    F: FnMut(&Supervisor<L>),
{
    let exit = loop {
        match commands.recv_timeout(poll) {
            Ok(Command::Shutdown) => break EventLoopExit::Shutdown,
            Ok(command) => {
                apply(supervisor, command);
                on_change(supervisor);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break EventLoopExit::Disconnected,
        }
        match supervisor.reap() {
            Ok(Some(_)) => on_change(supervisor),
            Ok(None) => {}
            Err(error) => warn!(target: LOOP_TARGET, error = %error, "failed to poll worker"),
        }
    };
    info!(target: LOOP_TARGET, ?exit, "leaving event loop");
    if let Err(error) = supervisor.stop() {
        error!(target: LOOP_TARGET, error = %error, "failed to stop worker during shutdown");
    }
    on_change(supervisor);
    exit
}

fn apply<L: WorkerLauncher>(supervisor: &Supervisor<L>, command: Command) {
    let result = match command {
        Command::Start => supervisor.start().map(drop),
        Command::Stop => supervisor.stop(),
        Command::Reload => supervisor.reload().map(drop),
        Command::Shutdown => Ok(()),
    };
    match result {
        Ok(()) => {}
        Err(error @ SupervisorError::AlreadyRunning { .. }) => {
            info!(target: LOOP_TARGET, %command, error = %error, "command ignored");
        }
        Err(error) => {
            error!(target: LOOP_TARGET, %command, error = %error, "command failed");
        }
    }
}
