//! Directory advisory lock used while setting up a mount.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An exclusive advisory lock on a directory.
///
/// The lock is taken on the directory itself, so no lock file appears in the
/// tree being synchronized. It is released on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    file: Option<File>,
}

impl DirLock {
    /// Takes the lock, polling until `timeout` passes.
    pub fn acquire(path: &Path, timeout: Duration) -> CoreResult<Self> {
        let file = File::open(path)?;
        let deadline = Instant::now() + timeout;
        loop {
            if file.try_lock_exclusive().is_ok() {
                debug!(path = %path.display(), "setup lock taken");
                return Ok(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                });
            }
            if Instant::now() >= deadline {
                return Err(CoreError::LockTimeout {
                    path: path.to_path_buf(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// The locked directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock.
    pub fn release(mut self) -> CoreResult<()> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file)?;
        }
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}
