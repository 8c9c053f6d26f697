//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A version-control backend call failed.
    #[error("backend error: {message}")]
    Backend {
        /// What failed.
        message: String,
        /// Whether the next scheduled attempt may succeed.
        retryable: bool,
    },

    /// The engine has been shut down.
    #[error("sync engine halted")]
    Halted,

    /// I/O error (spawning a worker thread or the backend process).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Creates a retryable backend error.
    pub fn backend_retryable(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable backend error.
    pub fn backend_fatal(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Backend { retryable, .. } => *retryable,
            SyncError::Io(_) => true,
            SyncError::Halted => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::backend_retryable("connection reset").is_retryable());
        assert!(!SyncError::backend_fatal("not a repository").is_retryable());
        assert!(!SyncError::Halted.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::backend_retryable("git push exited with 128");
        assert_eq!(err.to_string(), "backend error: git push exited with 128");
    }
}
