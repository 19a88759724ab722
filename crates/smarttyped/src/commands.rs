//! The closed command set consumed by the supervisor and the queue that
//! carries it.
//!
//! Signal delivery, configuration file events and the startup path all
//! push into the same queue, so the supervisor never needs to know which
//! mechanism produced a request.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::debug;

const COMMANDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Requests understood by the supervisor event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start the worker if the configuration enables it.
    Start,
    /// Stop the worker and wait for it to exit.
    Stop,
    /// Re-read the configuration and restart the worker.
    Reload,
    /// Stop the worker and leave the event loop.
    Shutdown,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reload => "reload",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Creates an unbounded command queue.
///
/// Producers never block, so a burst of file or signal events cannot stall
/// the thread that observed them.
#[must_use]
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (sender, receiver) = mpsc::channel();
    (
        CommandSender {
            inner: sender,
            source: "control",
        },
        CommandReceiver { inner: receiver },
    )
}

/// Cloneable producer handle labelled with the source it represents.
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: Sender<Command>,
    source: &'static str,
}

impl CommandSender {
    /// Returns a handle that tags its commands with `source` in logs.
    #[must_use]
    pub fn with_source(&self, source: &'static str) -> Self {
        Self {
            inner: self.inner.clone(),
            source,
        }
    }

    /// Enqueues `command`. Returns `false` once the event loop has gone.
    pub fn send(&self, command: Command) -> bool {
        debug!(
            target: COMMANDS_TARGET,
            source = self.source,
            %command,
            "command queued"
        );
        self.inner.send(command).is_ok()
    }
}

/// Consumer side of the queue, owned by the event loop.
#[derive(Debug)]
pub struct CommandReceiver {
    inner: Receiver<Command>,
}

impl CommandReceiver {
    /// Waits up to `timeout` for the next command.
    ///
    /// # Errors
    ///
    /// Returns [`RecvTimeoutError::Timeout`] when nothing arrived and
    /// [`RecvTimeoutError::Disconnected`] once every producer is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Command, RecvTimeoutError> {
        self.inner.recv_timeout(timeout)
    }

    /// Takes the next command if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<Command> {
        self.inner.try_recv().ok()
    }
}
