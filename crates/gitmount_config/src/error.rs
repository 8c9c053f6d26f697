//! Error types for configuration resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A present configuration file is malformed.
    #[error("{message} at {}({line})", file.display())]
    Parse {
        /// Parser message.
        message: String,
        /// File that failed to parse.
        file: PathBuf,
        /// 1-based line of the failure.
        line: usize,
    },

    /// A configuration file exists but could not be read.
    #[error("cannot read {}: {source}", file.display())]
    Read {
        /// File that could not be read.
        file: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(message: impl Into<String>, file: impl Into<PathBuf>, line: usize) -> Self {
        Self::Parse {
            message: message.into(),
            file: file.into(),
            line,
        }
    }
}
