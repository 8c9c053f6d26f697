//! Error types for mount instances.

use gitmount_control::ControlError;
use gitmount_sync_engine::SyncError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur starting or running a mount.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Another instance answers on the control socket.
    #[error("repository already mounted (control socket {socket:?} is live)")]
    AlreadyMounted {
        /// The live socket.
        socket: PathBuf,
    },

    /// The setup lock could not be taken in time.
    #[error("timed out waiting for setup lock on {path:?}")]
    LockTimeout {
        /// The locked directory.
        path: PathBuf,
    },

    /// The repository root is missing or not a directory.
    #[error("invalid repository root: {path:?}")]
    InvalidRoot {
        /// The offending path.
        path: PathBuf,
    },

    /// Control socket error.
    #[error("control error: {0}")]
    Control(#[from] ControlError),

    /// Sync engine error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Returns true if the failure is another instance owning the repository.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CoreError::AlreadyMounted { .. } | CoreError::LockTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_classification() {
        let mounted = CoreError::AlreadyMounted {
            socket: PathBuf::from("/srv/notes/@gitmount/control"),
        };
        assert!(mounted.is_busy());
        assert!(mounted.to_string().contains("already mounted"));

        let io = CoreError::Io(io::ErrorKind::PermissionDenied.into());
        assert!(!io.is_busy());
    }
}
