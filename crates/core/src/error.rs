//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("invalid partition name: {0}")]
    InvalidPartition(String),

    #[error("unknown housekeeping status: {0}")]
    UnknownStatus(String),

    #[error("unknown lifecycle kind: {0}")]
    UnknownLifecycle(String),

    #[error("invalid cleanup delay: {0}")]
    InvalidDelay(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
