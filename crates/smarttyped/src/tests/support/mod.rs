//! Test harness utilities for the supervisor suites.

mod launcher;
mod reporter;
mod world;

pub use launcher::{FakeLauncher, LauncherEvent};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{STOP_TIMEOUT, SupervisorWorld, world};
