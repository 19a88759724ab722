//! Entry point for the SmartType supervisor daemon.
//!
//! Delegates to [`smarttyped::run`], which parses the command line and
//! either runs the supervisor or controls a running one. The standard
//! streams are passed unlocked: supervisor threads log to stderr for the
//! whole life of the process.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    smarttyped::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
