//! Maps process signals onto supervisor commands.

use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::commands::{Command, CommandSender};

const SIGNALS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signals");
const HANDLED: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Errors reported while installing signal handlers.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Registering the handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The delivery thread could not be spawned.
    #[error("failed to spawn signal thread: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Translates a signal number into the command it requests.
#[must_use]
pub fn command_for_signal(signal: i32) -> Option<Command> {
    match signal {
        SIGTERM | SIGINT | SIGQUIT => Some(Command::Shutdown),
        SIGHUP => Some(Command::Reload),
        _ => None,
    }
}

/// Abstraction over signal delivery so launch sequencing can be tested
/// without touching process-wide handlers.
pub trait SignalSource {
    /// Keeps delivery alive until dropped.
    type Guard;

    /// Starts forwarding signals as commands on `commands`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`] when delivery cannot be set up.
    fn install(&self, commands: CommandSender) -> Result<Self::Guard, SignalError>;
}

/// Signal source backed by `signal-hook`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignals;

impl SignalSource for SystemSignals {
    type Guard = SignalRouter;

    fn install(&self, commands: CommandSender) -> Result<SignalRouter, SignalError> {
        SignalRouter::install(commands)
    }
}

/// Forwards termination and reload signals to the command queue.
///
/// Dropping the router stops delivery and joins its thread.
#[derive(Debug)]
pub struct SignalRouter {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalRouter {
    /// Registers handlers for SIGTERM, SIGINT, SIGQUIT and SIGHUP.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`] when registration fails.
    pub fn install(commands: CommandSender) -> Result<Self, SignalError> {
        let mut signals = Signals::new(HANDLED).map_err(|source| SignalError::Install { source })?;
        let handle = signals.handle();
        let commands = commands.with_source("signal");
        let thread = thread::Builder::new()
            .name("smarttyped-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    let Some(command) = command_for_signal(signal) else {
                        continue;
                    };
                    info!(
                        target: SIGNALS_TARGET,
                        signal,
                        %command,
                        "signal received"
                    );
                    if !commands.send(command) {
                        break;
                    }
                }
            })
            .map_err(|source| {
                handle.close();
                SignalError::Thread { source }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalRouter {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SIGNALS_TARGET, "signal thread panicked");
        }
    }
}
