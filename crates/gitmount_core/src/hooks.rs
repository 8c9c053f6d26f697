//! Entry points for the filesystem layer.

use gitmount_control::LeaseLockTable;
use gitmount_protocol::paths::{escape_path, is_valid_path, unescape_path};
use gitmount_sync_engine::{DirtyDebouncer, SyncGate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the filesystem layer calls into.
///
/// Cheap to clone; every clone drives the same mount.
#[derive(Clone)]
pub struct FsHooks {
    debouncer: Arc<DirtyDebouncer>,
    leases: Arc<LeaseLockTable>,
}

impl FsHooks {
    pub(crate) fn new(debouncer: Arc<DirtyDebouncer>, leases: Arc<LeaseLockTable>) -> Self {
        Self { debouncer, leases }
    }

    /// Called after every write, create, delete or rename.
    pub fn notify_mutation(&self) {
        self.debouncer.notify();
    }

    /// True while a lease defers synchronization.
    pub fn is_lock_held(&self) -> bool {
        self.leases.is_held()
    }

    /// Syncs now instead of waiting out the debounce window.
    pub fn request_flush(&self) {
        self.debouncer.flush();
    }

    /// Maps a path seen through the mount to its path in the repository.
    ///
    /// Every user name maps somewhere; `.bashrc` is stored as `@.bashrc`,
    /// so nothing written through the mount lands in `.git` or `@gitmount`.
    pub fn repo_path(&self, mounted: &Path) -> PathBuf {
        escape_path(mounted)
    }

    /// Maps a repository entry to the name the mount shows for it.
    ///
    /// Returns `None` for internal entries, which directory listings hide.
    pub fn mounted_name(&self, on_disk: &Path) -> Option<PathBuf> {
        is_valid_path(on_disk).then(|| unescape_path(on_disk))
    }
}

impl std::fmt::Debug for FsHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsHooks")
            .field("debouncer", &self.debouncer)
            .field("held", &self.is_lock_held())
            .finish()
    }
}
