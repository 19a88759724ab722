//! BDD test world: a supervisor over an in-memory launcher, its
//! configuration directory, and the optional watcher and event loop that
//! drive it.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use smarttype_config::ConfigStore;
use tempfile::TempDir;

use crate::commands::{Command, CommandSender, command_queue};
use crate::event_loop::{EventLoopExit, run_event_loop};
use crate::supervisor::{ReloadOutcome, StartOutcome, Supervisor, SupervisorError, WorkerState};
use crate::watcher::FileWatcher;

use super::launcher::FakeLauncher;
use super::reporter::RecordingHealthReporter;

/// Grace period given to fake workers before they are killed.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);
/// Quiet window used by scenario watchers.
pub const DEBOUNCE: Duration = Duration::from_millis(100);
const LOOP_POLL: Duration = Duration::from_millis(20);
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type ReloadThread = JoinHandle<(Result<ReloadOutcome, SupervisorError>, Instant)>;

/// Scenario world shared across BDD steps.
pub struct SupervisorWorld {
    dir: TempDir,
    pub launcher: FakeLauncher,
    pub reporter: Arc<RecordingHealthReporter>,
    pub supervisor: Arc<Supervisor<FakeLauncher>>,
    pub start_result: Option<Result<StartOutcome, SupervisorError>>,
    reload_thread: Option<ReloadThread>,
    pub reload_result: Option<(Result<ReloadOutcome, SupervisorError>, Instant)>,
    pub stop_finished: Option<Instant>,
    commands: Option<CommandSender>,
    watcher: Option<FileWatcher>,
    event_loop: Option<JoinHandle<EventLoopExit>>,
}

impl SupervisorWorld {
    /// Builds a world whose configuration file does not exist yet.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let launcher = FakeLauncher::default();
        let reporter = Arc::new(RecordingHealthReporter::default());
        let store = ConfigStore::new(dir.path().join("config.yaml"));
        let supervisor = Arc::new(Supervisor::new(
            store,
            launcher.clone(),
            STOP_TIMEOUT,
            reporter.clone(),
        ));
        Self {
            dir,
            launcher,
            reporter,
            supervisor,
            start_result: None,
            reload_thread: None,
            reload_result: None,
            stop_finished: None,
            commands: None,
            watcher: None,
            event_loop: None,
        }
    }

    /// Location of the scenario's configuration document.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// Replaces the configuration document on disk.
    pub fn write_config(&self, contents: &str) {
        fs::write(self.config_path(), contents).expect("write configuration");
    }

    /// Runs Start once and records its result.
    pub fn start(&mut self) {
        self.start_result = Some(self.supervisor.start());
    }

    /// Attaches a watcher and runs the event loop on a background thread.
    pub fn run_event_loop(&mut self) {
        let (sender, receiver) = command_queue();
        let watcher =
            FileWatcher::spawn(&self.config_path(), DEBOUNCE, sender.clone()).expect("watcher");
        let supervisor = Arc::clone(&self.supervisor);
        self.event_loop = Some(thread::spawn(move || {
            run_event_loop(&supervisor, &receiver, LOOP_POLL, |_| {})
        }));
        self.watcher = Some(watcher);
        self.commands = Some(sender);
    }

    /// Starts a Reload on a background thread and waits until it is
    /// blocked on the old worker's exit.
    pub fn begin_reload(&mut self) -> Result<(), String> {
        let supervisor = Arc::clone(&self.supervisor);
        self.reload_thread = Some(thread::spawn(move || {
            let result = supervisor.reload();
            (result, Instant::now())
        }));
        self.wait_until(|world| world.supervisor.state() == WorkerState::Stopping)
    }

    /// Runs Stop on the calling thread and records when it returned.
    pub fn stop(&mut self) -> Result<(), String> {
        self.supervisor.stop().map_err(|error| error.to_string())?;
        self.stop_finished = Some(Instant::now());
        if let Some(handle) = self.reload_thread.take() {
            let outcome = handle
                .join()
                .map_err(|_| "reload thread panicked".to_owned())?;
            self.reload_result = Some(outcome);
        }
        Ok(())
    }

    /// Polls until `condition` holds or the wait budget is spent.
    pub fn wait_until(&self, condition: impl Fn(&Self) -> bool) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if condition(self) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("condition not reached before timeout".to_owned())
    }
}

impl Default for SupervisorWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SupervisorWorld {
    fn drop(&mut self) {
        self.watcher.take();
        if let Some(sender) = self.commands.take() {
            sender.send(Command::Shutdown);
        }
        if let Some(handle) = self.event_loop.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reload_thread.take() {
            let _ = handle.join();
        }
        let _ = self.supervisor.stop();
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<SupervisorWorld> {
    RefCell::new(SupervisorWorld::new())
}
