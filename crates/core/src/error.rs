//! Error types for RepCRec
//!
//! Only conditions the engine cannot heal by itself are errors: a malformed
//! script, an unreadable file, or a bad configuration. Lock conflicts,
//! unavailable sites, deadlocks and rejected commits are reported as
//! [`EngineEvent`](crate::event::EngineEvent)s instead.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for RepCRec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading a script or config file
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Unrecognised instruction or malformed arguments
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number in the script
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build a parse error for `line`
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}
