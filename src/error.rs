//! Error types for Lightrack

use thiserror::Error;

/// Main error type for Lightrack
///
/// Only configuration problems and socket allocation failures ever surface
/// through this type. Everything that can go wrong once the tracker is
/// running (bind, connect, read, option tuning) is logged and retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Socket allocation failed: {0}")]
    Socket(std::io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Socket(_))
    }
}

/// Result type alias for Lightrack
pub type Result<T> = std::result::Result<T, Error>;
