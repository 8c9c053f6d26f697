//! Configuration for the sync engine and debouncer.

use crate::remote::RemoteClass;
use std::time::Duration;

/// Configuration for sync scheduling.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote name (or URL) to pull from and push to.
    pub remote: String,
    /// Branch to synchronize.
    pub branch: String,
    /// Interval for remotes on a local path.
    pub local_interval: Duration,
    /// Interval for network remotes on a private address range.
    pub private_interval: Duration,
    /// Interval for network remotes elsewhere.
    pub public_interval: Duration,
    /// Interval when the remote host does not resolve.
    pub unresolved_interval: Duration,
    /// Delay before retrying a failed push.
    pub push_retry: Duration,
    /// Delay before re-checking while a lease holds synchronization.
    pub held_recheck: Duration,
    /// Prefix of auto-generated commit messages.
    pub commit_prefix: String,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
            local_interval: Duration::from_secs(10),
            private_interval: Duration::from_secs(60),
            public_interval: Duration::from_secs(600),
            unresolved_interval: Duration::from_secs(60),
            push_retry: Duration::from_secs(60),
            held_recheck: Duration::from_secs(10),
            commit_prefix: "syncing files @".into(),
        }
    }

    /// Sets the three transport intervals.
    pub fn with_intervals(mut self, local: Duration, private: Duration, public: Duration) -> Self {
        self.local_interval = local;
        self.private_interval = private;
        self.public_interval = public;
        self
    }

    /// Sets the push retry delay.
    pub fn with_push_retry(mut self, delay: Duration) -> Self {
        self.push_retry = delay;
        self
    }

    /// Sets the re-check delay used while a lease is held.
    pub fn with_held_recheck(mut self, delay: Duration) -> Self {
        self.held_recheck = delay;
        self
    }

    /// Sync interval for a remote class.
    pub fn interval_for(&self, class: RemoteClass) -> Duration {
        match class {
            RemoteClass::Local => self.local_interval,
            RemoteClass::Private => self.private_interval,
            RemoteClass::Public => self.public_interval,
            RemoteClass::Unresolved => self.unresolved_interval,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("origin", "master")
    }
}

/// Configuration for mutation debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period after the last mutation before a sync fires.
    pub delay: Duration,
    /// Longest a burst may postpone its sync, measured from its first mutation.
    pub max_window: Duration,
}

impl DebounceConfig {
    /// Creates a debounce configuration.
    pub fn new(delay: Duration, max_window: Duration) -> Self {
        Self { delay, max_window }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(5 * 60))
    }
}
