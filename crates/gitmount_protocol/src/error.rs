//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or decoding control messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The length prefix is inconsistent (smaller than the prefix itself).
    ///
    /// Length framing cannot recover from this, so the connection must close.
    #[error("corrupt frame: {message}")]
    CorruptFrame {
        /// Description of the corruption.
        message: String,
    },

    /// The encoded payload does not fit in the configured prefix width.
    #[error("frame too large: {len} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Total frame length that was requested.
        len: usize,
        /// Largest frame the prefix width can describe.
        max: usize,
    },

    /// A key or value cannot be represented in the line codec.
    #[error("unencodable field {field:?}: {reason}")]
    InvalidField {
        /// The offending key.
        field: String,
        /// Why it cannot be encoded.
        reason: &'static str,
    },

    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// The prefix width is outside `1..=8`.
    #[error("invalid length prefix width: {0}")]
    InvalidPrefixWidth(usize),

    /// The request is well-framed but malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The peer did not send a complete frame before the receive timeout.
    #[error("receive timed out")]
    Timeout,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// I/O error on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Creates a corrupt frame error.
    pub fn corrupt_frame(message: impl Into<String>) -> Self {
        Self::CorruptFrame {
            message: message.into(),
        }
    }

    /// Returns true if the connection cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::InvalidField { .. }
                | ProtocolError::InvalidUtf8
                | ProtocolError::InvalidRequest(_)
        )
    }
}
