use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    /// An update targeted a record that is not stored.
    #[error("{0} does not exist")]
    NotFound(String),

    /// A write would break a uniqueness rule, such as a second unreferenced
    /// record for one path.
    #[error("duplicate: {0}")]
    Constraint(String),

    /// A stored row that no longer maps to a valid record.
    #[error("corrupt row: {0}")]
    InvalidRow(String),

    #[error("metadata store misconfigured: {0}")]
    Config(String),

    #[error("sqlite: {0}")]
    Database(#[from] sqlx::Error),

    #[error("preparing database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<beekeeper_core::Error> for MetadataError {
    fn from(err: beekeeper_core::Error) -> Self {
        Self::InvalidRow(err.to_string())
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;
