use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No object at `bucket/key`.
    #[error("no such object {0}")]
    NotFound(String),

    /// A request the backend refuses by contract, such as an oversized batch.
    #[error("rejected key or batch: {0}")]
    InvalidKey(String),

    /// Bad or incomplete backend settings.
    #[error("storage misconfigured: {0}")]
    Config(String),

    /// The backend could not be reached or did not answer in time.
    #[error("storage unreachable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("s3 request failed: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
