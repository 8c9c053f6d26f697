//! Version-control backend abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Working-tree status as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoStatus {
    /// Paths with changes already staged.
    pub staged: Vec<String>,
    /// Paths modified, deleted or untracked but not staged.
    pub unstaged: Vec<String>,
}

impl RepoStatus {
    /// Returns true if anything would be committed after staging.
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty() || !self.unstaged.is_empty()
    }
}

/// Result of pulling the remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Fast-forwarded or already up to date.
    Updated,
    /// The histories diverged and need a manual merge.
    Conflict,
}

/// A version-control backend executes repository operations.
///
/// Transport failures are reported as [`SyncError::Backend`]; a diverged pull
/// is not an error but [`PullOutcome::Conflict`].
pub trait VcsBackend: Send + Sync {
    /// Reads the working-tree status.
    fn status(&self) -> SyncResult<RepoStatus>;

    /// Stages one path, including deletions.
    fn stage(&self, path: &str) -> SyncResult<()>;

    /// Commits everything staged.
    fn commit(&self, message: &str) -> SyncResult<()>;

    /// Pulls `branch` from `remote`, fast-forward only.
    fn pull(&self, remote: &str, branch: &str) -> SyncResult<PullOutcome>;

    /// Pushes `branch` to `remote`.
    fn push(&self, remote: &str, branch: &str) -> SyncResult<()>;

    /// URL configured for `remote`, if it exists.
    fn remote_url(&self, remote: &str) -> SyncResult<Option<String>>;
}

/// A backend call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `status`
    Status,
    /// `stage(path)`
    Stage(String),
    /// `commit(message)`
    Commit(String),
    /// `pull`
    Pull,
    /// `push`
    Push,
    /// `remote_url`
    RemoteUrl,
}

/// Scripted pull result for [`MockBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPull {
    /// Return [`PullOutcome::Updated`].
    Updated,
    /// Return [`PullOutcome::Conflict`].
    Conflict,
    /// Fail with a retryable backend error.
    Fail,
}

#[derive(Debug)]
struct MockState {
    status: RepoStatus,
    remote_url: Option<String>,
    pulls: VecDeque<MockPull>,
    default_pull: MockPull,
    pushes: VecDeque<bool>,
    default_push: bool,
    calls: Vec<BackendCall>,
}

/// A mock backend for testing.
///
/// Committing clears the scripted status. Each call sleeps for the configured
/// delay and tracks how many calls overlap.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBackend {
    /// Creates a clean backend with a local-path remote.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                status: RepoStatus::default(),
                remote_url: Some("/srv/git/mock.git".into()),
                pulls: VecDeque::new(),
                default_pull: MockPull::Updated,
                pushes: VecDeque::new(),
                default_push: true,
                calls: Vec::new(),
            }),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the working-tree status.
    pub fn set_status(&self, status: RepoStatus) {
        self.state.lock().status = status;
    }

    /// Marks paths as modified and unstaged.
    pub fn touch(&self, paths: &[&str]) {
        let mut state = self.state.lock();
        state
            .status
            .unstaged
            .extend(paths.iter().map(|p| p.to_string()));
    }

    /// Sets the remote URL.
    pub fn set_remote_url(&self, url: Option<&str>) {
        self.state.lock().remote_url = url.map(str::to_string);
    }

    /// Queues the result of the next pull.
    pub fn queue_pull(&self, result: MockPull) {
        self.state.lock().pulls.push_back(result);
    }

    /// Sets the pull result used once the queue is empty.
    pub fn set_default_pull(&self, result: MockPull) {
        self.state.lock().default_pull = result;
    }

    /// Queues the result of the next push.
    pub fn queue_push(&self, ok: bool) {
        self.state.lock().pushes.push_back(ok);
    }

    /// Sets the push result used once the queue is empty.
    pub fn set_default_push(&self, ok: bool) {
        self.state.lock().default_push = ok;
    }

    /// Makes every call sleep for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of pushes attempted.
    pub fn push_count(&self) -> usize {
        self.count(|c| *c == BackendCall::Push)
    }

    /// Number of commits made.
    pub fn commit_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Commit(_)))
    }

    /// Largest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, call: BackendCall) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.state.lock().calls.push(call);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        InFlight(&self.in_flight)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl VcsBackend for MockBackend {
    fn status(&self) -> SyncResult<RepoStatus> {
        let _call = self.enter(BackendCall::Status);
        Ok(self.state.lock().status.clone())
    }

    fn stage(&self, path: &str) -> SyncResult<()> {
        let _call = self.enter(BackendCall::Stage(path.to_string()));
        let mut state = self.state.lock();
        if let Some(pos) = state.status.unstaged.iter().position(|p| p == path) {
            let p = state.status.unstaged.remove(pos);
            state.status.staged.push(p);
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> SyncResult<()> {
        let _call = self.enter(BackendCall::Commit(message.to_string()));
        let mut state = self.state.lock();
        if state.status.staged.is_empty() {
            return Err(SyncError::backend_fatal("nothing to commit"));
        }
        state.status.staged.clear();
        Ok(())
    }

    fn pull(&self, _remote: &str, _branch: &str) -> SyncResult<PullOutcome> {
        let _call = self.enter(BackendCall::Pull);
        let mut state = self.state.lock();
        let next = state.pulls.pop_front().unwrap_or(state.default_pull);
        match next {
            MockPull::Updated => Ok(PullOutcome::Updated),
            MockPull::Conflict => Ok(PullOutcome::Conflict),
            MockPull::Fail => Err(SyncError::backend_retryable("mock fetch failed")),
        }
    }

    fn push(&self, _remote: &str, _branch: &str) -> SyncResult<()> {
        let _call = self.enter(BackendCall::Push);
        let mut state = self.state.lock();
        if state.pushes.pop_front().unwrap_or(state.default_push) {
            Ok(())
        } else {
            Err(SyncError::backend_retryable("mock push rejected"))
        }
    }

    fn remote_url(&self, _remote: &str) -> SyncResult<Option<String>> {
        let _call = self.enter(BackendCall::RemoteUrl);
        Ok(self.state.lock().remote_url.clone())
    }
}
