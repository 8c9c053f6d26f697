//! Error types for the control server and client.

use gitmount_config::ConfigError;
use gitmount_protocol::ProtocolError;
use gitmount_sync_engine::SyncError;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur on the control socket.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Framing or codec failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration lookup failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A timer or worker could not be started.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The server replied with a non-`ok` status.
    #[error("request {action} rejected: {status}")]
    Rejected {
        /// Action that was sent.
        action: String,
        /// Status that came back.
        status: String,
    },

    /// The server is already shut down.
    #[error("server shut down")]
    ShutDown,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Returns true if the peer is gone or never answered.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ControlError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ),
            ControlError::Protocol(ProtocolError::Closed | ProtocolError::Timeout) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_classification() {
        let refused = ControlError::Io(std::io::ErrorKind::ConnectionRefused.into());
        assert!(refused.is_unreachable());
        assert!(ControlError::Protocol(ProtocolError::Closed).is_unreachable());

        let rejected = ControlError::Rejected {
            action: "lock".into(),
            status: "error".into(),
        };
        assert!(!rejected.is_unreachable());
        assert_eq!(rejected.to_string(), "request lock rejected: error");
    }
}
