//! Counters and timestamps describing the supervisor's lifetime.
//!
//! Only the supervisor records events. Readers receive a [`StatsSnapshot`]
//! copied out under a short critical section, never a reference into the
//! live counters.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    reloads: u64,
    failed_reloads: u64,
    last_reload: Option<SystemTime>,
    worker_starts: u64,
    worker_exits: u64,
    current_worker_pid: Option<u32>,
}

/// Point-in-time copy of the supervisor statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Wall-clock time the registry was created.
    pub started_at: SystemTime,
    /// Time elapsed since `started_at`, computed when the snapshot was taken.
    pub uptime: Duration,
    /// Reloads that were applied.
    pub reloads: u64,
    /// Reloads rejected because the new configuration or binary was unusable.
    pub failed_reloads: u64,
    /// Wall-clock time of the last applied reload.
    pub last_reload: Option<SystemTime>,
    /// Workers spawned over the supervisor's lifetime.
    pub worker_starts: u64,
    /// Workers that exited without being asked to.
    pub worker_exits: u64,
    /// PID of the live worker, if any.
    pub current_worker_pid: Option<u32>,
}

/// Shared statistics store.
#[derive(Debug)]
pub struct StatsRegistry {
    started_at: SystemTime,
    started: Instant,
    counters: Mutex<Counters>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRegistry {
    /// Creates a registry whose uptime starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: SystemTime::now(),
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Copies the counters and computes the current uptime.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = *self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            started_at: self.started_at,
            uptime: self.started.elapsed(),
            reloads: counters.reloads,
            failed_reloads: counters.failed_reloads,
            last_reload: counters.last_reload,
            worker_starts: counters.worker_starts,
            worker_exits: counters.worker_exits,
            current_worker_pid: counters.current_worker_pid,
        }
    }

    pub(crate) fn record_reload(&self) {
        self.update(|counters| {
            counters.reloads += 1;
            counters.last_reload = Some(SystemTime::now());
        });
    }

    pub(crate) fn record_failed_reload(&self) {
        self.update(|counters| counters.failed_reloads += 1);
    }

    pub(crate) fn record_worker_started(&self, pid: u32) {
        self.update(|counters| {
            counters.worker_starts += 1;
            counters.current_worker_pid = Some(pid);
        });
    }

    pub(crate) fn record_worker_stopped(&self) {
        self.update(|counters| counters.current_worker_pid = None);
    }

    pub(crate) fn record_worker_exited(&self) {
        self.update(|counters| {
            counters.worker_exits += 1;
            counters.current_worker_pid = None;
        });
    }

    fn update(&self, apply: impl FnOnce(&mut Counters)) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        apply(&mut counters);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fresh_registry_is_empty() {
        let snapshot = StatsRegistry::new().snapshot();
        assert_eq!(snapshot.reloads, 0);
        assert_eq!(snapshot.last_reload, None);
        assert_eq!(snapshot.current_worker_pid, None);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let stats = StatsRegistry::new();
        stats.record_worker_started(41);
        let before = stats.snapshot();
        stats.record_worker_exited();
        stats.record_reload();
        assert_eq!(before.current_worker_pid, Some(41));
        assert_eq!(before.reloads, 0);
        let after = stats.snapshot();
        assert_eq!(after.current_worker_pid, None);
        assert_eq!(after.worker_exits, 1);
        assert_eq!(after.reloads, 1);
        assert!(after.last_reload.is_some());
    }

    #[test]
    fn uptime_grows_between_snapshots() {
        let stats = StatsRegistry::new();
        let first = stats.snapshot();
        thread::sleep(Duration::from_millis(5));
        let second = stats.snapshot();
        assert!(second.uptime > first.uptime);
        assert_eq!(first.started_at, second.started_at);
    }

    #[test]
    fn concurrent_readers_see_consistent_counts() {
        let stats = Arc::new(StatsRegistry::new());
        let writer = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for pid in 1..=500 {
                    stats.record_worker_started(pid);
                    stats.record_reload();
                }
            })
        };
        for _ in 0..200 {
            let snapshot = stats.snapshot();
            // Each iteration records a start before the reload.
            assert!(snapshot.worker_starts >= snapshot.reloads);
        }
        writer.join().expect("writer thread");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.worker_starts, 500);
        assert_eq!(snapshot.reloads, 500);
        assert_eq!(snapshot.current_worker_pid, Some(500));
    }
}
