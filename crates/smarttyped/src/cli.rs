//! Command-line interface for the `smarttyped` binary.

use clap::{Parser, Subcommand};

use smarttype_config::DaemonSettings;

use crate::control::ControlDirective;

/// SmartType supervisor daemon.
#[derive(Parser, Debug)]
#[command(name = "smarttyped", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) settings: DaemonSettings,
    /// Action to perform; defaults to `run` in the foreground.
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

/// Top-level actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Runs the supervisor.
    Run {
        /// Detach into the background.
        #[arg(short, long)]
        daemon: bool,
    },
    /// Stops a running supervisor and waits for it to exit.
    Stop,
    /// Asks a running supervisor to reload its configuration.
    Reload,
    /// Prints the health snapshot of a running supervisor.
    Status,
}

impl CliCommand {
    /// Control directive for commands that address a running instance.
    pub(crate) const fn directive(self) -> Option<ControlDirective> {
        match self {
            Self::Run { .. } => None,
            Self::Stop => Some(ControlDirective::Stop),
            Self::Reload => Some(ControlDirective::Reload),
            Self::Status => Some(ControlDirective::Status),
        }
    }
}
