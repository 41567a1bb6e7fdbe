//! Error types for Tidepool

use thiserror::Error;

/// Core error type for pool operations
#[derive(Error, Debug)]
pub enum TidepoolError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Pool is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, TidepoolError>;
