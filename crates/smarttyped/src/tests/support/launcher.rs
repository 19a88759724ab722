//! In-memory worker doubles that count live processes instead of spawning
//! them.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::supervisor::{SupervisorError, WorkerExit, WorkerHandle, WorkerLauncher};

const FIRST_PID: u32 = 1000;
const WAIT_STEP: Duration = Duration::from_millis(5);

/// Observable worker lifecycle transitions, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherEvent {
    Spawned(u32),
    Exited(u32),
}

#[derive(Debug, Default)]
struct LauncherState {
    live: AtomicUsize,
    max_live: AtomicUsize,
    spawns: AtomicUsize,
    next_pid: AtomicU32,
    missing_binary: AtomicBool,
    ignore_terminate: AtomicBool,
    fail_exit_checks: AtomicBool,
    fail_launches: AtomicBool,
    exit_delay: Mutex<Duration>,
    current_crash: Mutex<Option<Arc<AtomicBool>>>,
    events: Mutex<Vec<LauncherEvent>>,
}

impl LauncherState {
    fn record(&self, event: LauncherEvent) {
        self.events.lock().expect("events mutex poisoned").push(event);
    }
}

/// Launcher double shared between a scenario and the supervisor under test.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    state: Arc<LauncherState>,
}

impl FakeLauncher {
    /// Makes every launch and preflight fail as if no binary were installed.
    pub fn remove_binary(&self) {
        self.state.missing_binary.store(true, Ordering::SeqCst);
    }

    /// Delays each worker's exit after it is asked to stop.
    pub fn exit_after(&self, delay: Duration) {
        *self.state.exit_delay.lock().expect("delay mutex poisoned") = delay;
    }

    /// Makes workers ignore graceful stop requests.
    pub fn ignore_terminate(&self) {
        self.state.ignore_terminate.store(true, Ordering::SeqCst);
    }

    /// Makes every status poll and wait on a worker fail with an IO error.
    pub fn fail_exit_checks(&self) {
        self.state.fail_exit_checks.store(true, Ordering::SeqCst);
    }

    /// Makes launches fail after a successful preflight.
    pub fn fail_launches(&self) {
        self.state.fail_launches.store(true, Ordering::SeqCst);
    }

    /// Makes the most recently spawned worker exit on its own.
    pub fn crash_current(&self) {
        if let Some(flag) = self
            .state
            .current_crash
            .lock()
            .expect("crash mutex poisoned")
            .as_ref()
        {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Workers currently alive.
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live workers observed.
    pub fn max_live(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }

    /// Workers spawned so far.
    pub fn spawns(&self) -> usize {
        self.state.spawns.load(Ordering::SeqCst)
    }

    /// Spawn and exit transitions in order.
    pub fn events(&self) -> Vec<LauncherEvent> {
        self.state.events.lock().expect("events mutex poisoned").clone()
    }

    fn binary_missing(&self) -> Result<(), SupervisorError> {
        if self.state.missing_binary.load(Ordering::SeqCst) {
            return Err(SupervisorError::BinaryNotFound {
                searched: vec![
                    PathBuf::from("/usr/local/bin/smarttype-hook"),
                    PathBuf::from("./target/release/smarttype-hook"),
                ],
            });
        }
        Ok(())
    }
}

impl WorkerLauncher for FakeLauncher {
    fn preflight(&self) -> Result<(), SupervisorError> {
        self.binary_missing()
    }

    fn launch(&self) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        self.binary_missing()?;
        if self.state.fail_launches.load(Ordering::SeqCst) {
            return Err(SupervisorError::Spawn {
                binary: PathBuf::from("/usr/local/bin/smarttype-hook"),
                source: io::Error::other("exec format error"),
            });
        }
        let pid = FIRST_PID + self.state.next_pid.fetch_add(1, Ordering::SeqCst);
        self.state.spawns.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);
        self.state.record(LauncherEvent::Spawned(pid));
        let crashed = Arc::new(AtomicBool::new(false));
        *self
            .state
            .current_crash
            .lock()
            .expect("crash mutex poisoned") = Some(Arc::clone(&crashed));
        Ok(Box::new(FakeWorker {
            pid,
            state: Arc::clone(&self.state),
            exit_at: None,
            crashed,
            exited: None,
        }))
    }
}

/// Worker double whose exit timing is driven by the launcher settings.
#[derive(Debug)]
pub struct FakeWorker {
    pid: u32,
    state: Arc<LauncherState>,
    exit_at: Option<Instant>,
    crashed: Arc<AtomicBool>,
    exited: Option<WorkerExit>,
}

impl FakeWorker {
    fn finish(&mut self, exit: WorkerExit) -> WorkerExit {
        if self.exited.is_none() {
            self.exited = Some(exit);
            self.state.live.fetch_sub(1, Ordering::SeqCst);
            self.state.record(LauncherEvent::Exited(self.pid));
        }
        exit
    }
}

impl WorkerHandle for FakeWorker {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> io::Result<()> {
        if !self.state.ignore_terminate.load(Ordering::SeqCst) && self.exit_at.is_none() {
            let delay = *self.state.exit_delay.lock().expect("delay mutex poisoned");
            self.exit_at = Some(Instant::now() + delay);
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.exit_at = Some(Instant::now());
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<Option<WorkerExit>> {
        if self.state.fail_exit_checks.load(Ordering::SeqCst) {
            return Err(io::Error::other("status unavailable"));
        }
        if let Some(exit) = self.exited {
            return Ok(Some(exit));
        }
        if self.crashed.load(Ordering::SeqCst) {
            return Ok(Some(self.finish(WorkerExit {
                code: Some(101),
                signal: None,
            })));
        }
        match self.exit_at {
            Some(at) if Instant::now() >= at => Ok(Some(self.finish(WorkerExit {
                code: None,
                signal: Some(2),
            }))),
            _ => Ok(None),
        }
    }

    fn wait(&mut self) -> io::Result<WorkerExit> {
        loop {
            if let Some(exit) = self.try_wait()? {
                return Ok(exit);
            }
            thread::sleep(WAIT_STEP);
        }
    }
}
