//! Sync engine: schedules commit, pull and push cycles.

use crate::backend::{PullOutcome, RepoStatus, VcsBackend};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gate::{SuspendListener, SyncGate, SyncTrigger};
use crate::remote::{RemoteClass, RemoteLocation};
use crate::timer::TimerSlot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The step a cycle is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle running.
    Idle,
    /// Staging and committing local changes.
    Committing,
    /// Pulling the remote branch.
    Pulling,
    /// Pushing the local branch.
    Pushing,
    /// Shut down; no further cycles.
    Halted,
}

impl SyncPhase {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Committing | SyncPhase::Pulling | SyncPhase::Pushing
        )
    }
}

/// How a trigger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle held the busy guard; nothing ran.
    Busy,
    /// The engine is shut down.
    Halted,
    /// A lease held synchronization; re-check scheduled.
    Deferred,
    /// Nothing changed and the interval had not elapsed.
    NotDue,
    /// The push landed.
    Synced,
    /// A step failed; retry scheduled.
    Failed,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ran past the gate check.
    pub cycles: u64,
    /// Commits created.
    pub commits: u64,
    /// Successful pushes.
    pub pushes: u64,
    /// Failed pushes.
    pub push_failures: u64,
    /// Pulls that found diverged histories.
    pub conflicts: u64,
    /// Cycles deferred by a lease.
    pub deferred: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Snapshot of engine state.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Current phase.
    pub phase: SyncPhase,
    /// Time since the last successful push.
    pub since_last_sync: Option<Duration>,
    /// The remote diverged and needs a manual merge.
    pub merge_needed: bool,
    /// A push failed and its retry is pending.
    pub retry_pending: bool,
    /// Time until the next scheduled evaluation.
    pub next_evaluation: Option<Duration>,
    /// Counters.
    pub stats: SyncStats,
}

#[derive(Debug)]
struct SyncState {
    phase: SyncPhase,
    last_sync: Option<Instant>,
    retry_at: Option<Instant>,
    merge_needed: bool,
    stats: SyncStats,
}

/// Schedules and runs synchronization against a [`VcsBackend`].
///
/// At most one cycle runs at a time: `trigger` returns immediately when a
/// cycle is already in flight. After every cycle that ran, the next
/// evaluation is scheduled from its outcome: the remote's interval after a
/// push, the retry delay after a failure, the re-check delay while held.
pub struct SyncEngine<B: VcsBackend> {
    config: SyncConfig,
    backend: Arc<B>,
    gate: Arc<dyn SyncGate>,
    busy: Mutex<()>,
    state: Mutex<SyncState>,
    halted: AtomicBool,
    schedule: TimerSlot,
}

impl<B: VcsBackend + 'static> SyncEngine<B> {
    /// Creates an engine and starts its scheduling thread.
    ///
    /// No cycle runs until [`trigger`](Self::trigger) or
    /// [`request_sync`](Self::request_sync).
    pub fn new(config: SyncConfig, backend: B, gate: Arc<dyn SyncGate>) -> SyncResult<Arc<Self>> {
        let engine = Arc::new(Self {
            config,
            backend: Arc::new(backend),
            gate,
            busy: Mutex::new(()),
            state: Mutex::new(SyncState {
                phase: SyncPhase::Idle,
                last_sync: None,
                retry_at: None,
                merge_needed: false,
                stats: SyncStats::default(),
            }),
            halted: AtomicBool::new(false),
            schedule: TimerSlot::new("gitmount-sync"),
        });

        let weak: Weak<Self> = Arc::downgrade(&engine);
        engine.schedule.start(move || {
            if let Some(engine) = weak.upgrade() {
                engine.trigger();
            }
        })?;
        Ok(engine)
    }
}

impl<B: VcsBackend> SyncEngine<B> {
    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SyncPhase {
        self.state.lock().phase
    }

    /// Returns true if the remote diverged and needs a manual merge.
    pub fn merge_needed(&self) -> bool {
        self.state.lock().merge_needed
    }

    /// Returns the statistics.
    pub fn stats(&self) -> SyncStats {
        self.state.lock().stats.clone()
    }

    /// Returns a snapshot of the engine.
    pub fn status(&self) -> SyncStatus {
        let now = Instant::now();
        let next_evaluation = self
            .schedule
            .deadline()
            .map(|at| at.saturating_duration_since(now));
        let state = self.state.lock();
        SyncStatus {
            phase: state.phase,
            since_last_sync: state.last_sync.map(|t| now.saturating_duration_since(t)),
            merge_needed: state.merge_needed,
            retry_pending: state.retry_at.is_some(),
            next_evaluation,
            stats: state.stats.clone(),
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has begun.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Makes the next cycle push regardless of the interval.
    pub fn force_push(&self) {
        self.state.lock().last_sync = None;
    }

    /// Schedules an evaluation right away on the scheduling thread.
    pub fn request_sync(&self) {
        if !self.is_halted() {
            self.schedule.arm_after(Duration::ZERO);
        }
    }

    /// Runs one cycle unless one is already running.
    ///
    /// The next evaluation is rescheduled before the busy guard is released.
    pub fn trigger(&self) -> CycleOutcome {
        let Some(_busy) = self.busy.try_lock() else {
            debug!("sync already in progress");
            return CycleOutcome::Busy;
        };
        if self.is_halted() {
            return CycleOutcome::Halted;
        }

        let (outcome, next) = self.run_cycle();
        if !self.is_halted() {
            self.schedule.arm_after(next);
        }
        outcome
    }

    /// Stops scheduling, waits for an in-flight cycle, then runs one final
    /// forced cycle.
    ///
    /// The final cycle still honors the gate. Later calls are no-ops.
    pub fn shutdown(&self) -> SyncResult<CycleOutcome> {
        if self.halted.swap(true, Ordering::SeqCst) {
            return Err(SyncError::Halted);
        }
        info!("sync engine shutting down");
        self.schedule.cancel();
        let busy = self.busy.lock();
        self.schedule.stop();

        self.force_push();
        let (outcome, _) = self.run_cycle();
        self.state.lock().phase = SyncPhase::Halted;
        drop(busy);

        info!(?outcome, "final sync finished");
        Ok(outcome)
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.state.lock().phase = phase;
    }

    fn record_error(&self, err: &SyncError) {
        self.state.lock().stats.last_error = Some(err.to_string());
    }

    fn remote_class(&self) -> RemoteClass {
        match self.backend.remote_url(&self.config.remote) {
            Ok(Some(url)) => RemoteLocation::parse(&url).classify(),
            Ok(None) => RemoteLocation::parse(&self.config.remote).classify(),
            Err(e) => {
                debug!(error = %e, "could not read remote url");
                RemoteClass::Unresolved
            }
        }
    }

    /// One pass of the cycle. Caller holds the busy guard.
    fn run_cycle(&self) -> (CycleOutcome, Duration) {
        if self.gate.is_held() {
            debug!("sync deferred by lease");
            self.state.lock().stats.deferred += 1;
            return (CycleOutcome::Deferred, self.config.held_recheck);
        }

        let status = match self.backend.status() {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "could not read repository status");
                self.record_error(&e);
                return (CycleOutcome::Failed, self.config.push_retry);
            }
        };

        let interval = self.config.interval_for(self.remote_class());
        let now = Instant::now();
        let (since, retry_at) = {
            let state = self.state.lock();
            (
                state.last_sync.map(|t| now.saturating_duration_since(t)),
                state.retry_at,
            )
        };
        // A pending push retry is due on its own deadline, whatever the interval.
        let retry_wait = retry_at.map(|at| at.saturating_duration_since(now));
        let due = since.map_or(true, |s| s >= interval) || retry_wait == Some(Duration::ZERO);

        if !status.has_changes() && !due {
            let mut wait = interval - since.unwrap_or_default();
            if let Some(retry_wait) = retry_wait {
                wait = wait.min(retry_wait);
            }
            debug!(?wait, "nothing to sync yet");
            return (CycleOutcome::NotDue, wait);
        }

        self.state.lock().stats.cycles += 1;
        if status.has_changes() {
            self.commit(&status);
        }
        self.pull();
        let outcome = self.push(interval);
        self.set_phase(SyncPhase::Idle);
        outcome
    }

    fn commit(&self, status: &RepoStatus) {
        self.set_phase(SyncPhase::Committing);
        for path in &status.unstaged {
            if let Err(e) = self.backend.stage(path) {
                warn!(%path, error = %e, "failed to stage");
            }
        }
        let message = format!(
            "{} {}",
            self.config.commit_prefix,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        match self.backend.commit(&message) {
            Ok(()) => {
                debug!(%message, "committed");
                self.state.lock().stats.commits += 1;
            }
            Err(e) => {
                warn!(error = %e, "commit failed");
                self.record_error(&e);
            }
        }
    }

    fn pull(&self) {
        self.set_phase(SyncPhase::Pulling);
        match self.backend.pull(&self.config.remote, &self.config.branch) {
            Ok(PullOutcome::Updated) => {
                let mut state = self.state.lock();
                if state.merge_needed {
                    info!("remote merged; merge no longer needed");
                }
                state.merge_needed = false;
            }
            Ok(PullOutcome::Conflict) => {
                let mut state = self.state.lock();
                state.stats.conflicts += 1;
                if !state.merge_needed {
                    warn!(
                        remote = %self.config.remote,
                        branch = %self.config.branch,
                        "remote has diverged; merge needed"
                    );
                }
                state.merge_needed = true;
            }
            Err(e) => {
                warn!(error = %e, "pull failed");
                self.record_error(&e);
            }
        }
    }

    fn push(&self, interval: Duration) -> (CycleOutcome, Duration) {
        self.set_phase(SyncPhase::Pushing);
        match self.backend.push(&self.config.remote, &self.config.branch) {
            Ok(()) => {
                let mut state = self.state.lock();
                state.last_sync = Some(Instant::now());
                state.retry_at = None;
                state.stats.pushes += 1;
                debug!(?interval, "push succeeded");
                (CycleOutcome::Synced, interval)
            }
            Err(e) => {
                let retry = self.config.push_retry;
                warn!(error = %e, ?retry, "push failed; retrying");
                let mut state = self.state.lock();
                state.retry_at = Some(Instant::now() + retry);
                state.stats.push_failures += 1;
                state.stats.last_error = Some(e.to_string());
                (CycleOutcome::Failed, retry)
            }
        }
    }
}

impl<B: VcsBackend> SyncTrigger for SyncEngine<B> {
    fn trigger_sync(&self) {
        self.trigger();
    }
}

impl<B: VcsBackend> SuspendListener for SyncEngine<B> {
    fn on_suspend(&self) {
        debug!("sync suspended");
    }

    fn on_resume(&self) {
        debug!("sync resumed");
        self.request_sync();
    }
}

impl<B: VcsBackend> std::fmt::Debug for SyncEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("remote", &self.config.remote)
            .field("branch", &self.config.branch)
            .field("halted", &self.is_halted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MockBackend, MockPull};
    use crate::gate::OpenGate;
    use std::thread;

    fn fast_config() -> SyncConfig {
        SyncConfig::new("origin", "master")
            .with_intervals(
                Duration::from_secs(3600),
                Duration::from_secs(3600),
                Duration::from_secs(3600),
            )
            .with_push_retry(Duration::from_secs(3600))
            .with_held_recheck(Duration::from_secs(3600))
    }

    fn engine(backend: MockBackend) -> Arc<SyncEngine<MockBackend>> {
        SyncEngine::new(fast_config(), backend, Arc::new(OpenGate)).unwrap()
    }

    struct FixedGate(AtomicBool);

    impl SyncGate for FixedGate {
        fn is_held(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn first_trigger_pushes_even_when_clean() {
        let e = engine(MockBackend::new());
        assert_eq!(e.trigger(), CycleOutcome::Synced);
        assert_eq!(e.backend().push_count(), 1);
        assert_eq!(e.backend().commit_count(), 0);
        assert!(e.status().since_last_sync.is_some());
    }

    #[test]
    fn clean_and_recent_is_not_due() {
        let e = engine(MockBackend::new());
        e.trigger();
        assert_eq!(e.trigger(), CycleOutcome::NotDue);
        assert_eq!(e.backend().push_count(), 1);
        let next = e.status().next_evaluation.unwrap();
        assert!(next > Duration::from_secs(3500));
    }

    #[test]
    fn changes_are_staged_and_committed() {
        let backend = MockBackend::new();
        backend.touch(&["notes.txt", "todo.md"]);
        let e = engine(backend);
        e.trigger();

        let calls = e.backend().calls();
        assert!(calls.contains(&BackendCall::Stage("notes.txt".into())));
        assert!(calls.contains(&BackendCall::Stage("todo.md".into())));
        let commit = calls
            .iter()
            .find_map(|c| match c {
                BackendCall::Commit(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert!(commit.starts_with("syncing files @ "));
        let pull = calls.iter().position(|c| *c == BackendCall::Pull).unwrap();
        let push = calls.iter().position(|c| *c == BackendCall::Push).unwrap();
        assert!(pull < push);
        assert_eq!(e.stats().commits, 1);
    }

    #[test]
    fn changes_make_cycle_due_inside_interval() {
        let e = engine(MockBackend::new());
        e.trigger();
        e.backend().touch(&["late.txt"]);
        assert_eq!(e.trigger(), CycleOutcome::Synced);
        assert_eq!(e.backend().push_count(), 2);
    }

    #[test]
    fn force_push_makes_clean_cycle_due() {
        let e = engine(MockBackend::new());
        e.trigger();
        e.force_push();
        assert_eq!(e.trigger(), CycleOutcome::Synced);
        assert_eq!(e.backend().push_count(), 2);
    }

    #[test]
    fn conflict_sets_merge_needed_until_clean_pull() {
        let backend = MockBackend::new();
        backend.queue_pull(MockPull::Conflict);
        backend.queue_push(false);
        let e = engine(backend);

        assert_eq!(e.trigger(), CycleOutcome::Failed);
        assert!(e.merge_needed());
        let status = e.status();
        assert!(status.retry_pending);
        assert_eq!(status.stats.conflicts, 1);

        e.force_push();
        assert_eq!(e.trigger(), CycleOutcome::Synced);
        assert!(!e.merge_needed());
        assert!(!e.status().retry_pending);
    }

    #[test]
    fn failed_pull_still_pushes() {
        let backend = MockBackend::new();
        backend.queue_pull(MockPull::Fail);
        let e = engine(backend);
        assert_eq!(e.trigger(), CycleOutcome::Synced);
        assert!(!e.merge_needed());
        assert!(e.stats().last_error.is_some());
    }

    #[test]
    fn held_gate_defers_cycle() {
        let gate = Arc::new(FixedGate(AtomicBool::new(true)));
        let e = SyncEngine::new(fast_config(), MockBackend::new(), gate.clone()).unwrap();
        assert_eq!(e.trigger(), CycleOutcome::Deferred);
        assert_eq!(e.backend().push_count(), 0);
        assert_eq!(e.stats().deferred, 1);

        gate.0.store(false, Ordering::SeqCst);
        assert_eq!(e.trigger(), CycleOutcome::Synced);
    }

    #[test]
    fn concurrent_triggers_never_overlap() {
        let backend = MockBackend::new();
        backend.set_delay(Duration::from_millis(5));
        let e = engine(backend);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                thread::spawn(move || {
                    for _ in 0..5 {
                        e.force_push();
                        e.trigger();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(e.backend().max_in_flight(), 1);
        assert!(e.backend().push_count() >= 1);
    }

    #[test]
    fn shutdown_runs_final_forced_cycle() {
        let e = engine(MockBackend::new());
        e.trigger();
        assert_eq!(e.shutdown().unwrap(), CycleOutcome::Synced);
        assert_eq!(e.backend().push_count(), 2);
        assert_eq!(e.phase(), SyncPhase::Halted);

        assert_eq!(e.trigger(), CycleOutcome::Halted);
        assert!(matches!(e.shutdown(), Err(SyncError::Halted)));
    }

    #[test]
    fn shutdown_honors_held_gate() {
        let gate = Arc::new(FixedGate(AtomicBool::new(true)));
        let e = SyncEngine::new(fast_config(), MockBackend::new(), gate).unwrap();
        assert_eq!(e.shutdown().unwrap(), CycleOutcome::Deferred);
        assert_eq!(e.backend().push_count(), 0);
    }

    #[test]
    fn request_sync_runs_on_scheduler() {
        let e = engine(MockBackend::new());
        e.request_sync();
        let deadline = Instant::now() + Duration::from_secs(2);
        while e.backend().push_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(e.backend().push_count(), 1);
    }
}
