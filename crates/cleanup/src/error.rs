//! Cleanup error types.

use crate::catalog::CatalogError;
use beekeeper_metadata::MetadataError;
use beekeeper_storage::StorageError;
use thiserror::Error;

/// Undeleted keys shown in a partial-deletion message.
const MAX_KEYS_IN_MESSAGE: usize = 5;

/// Errors raised while cleaning up a record.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A batch delete confirmed fewer keys than it was asked to remove.
    #[error(
        "partial deletion under {path}: {} keys not deleted ({})",
        undeleted.len(),
        preview_keys(undeleted)
    )]
    PartialDeletion {
        path: String,
        undeleted: Vec<String>,
        bytes_freed: u64,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

fn preview_keys(keys: &[String]) -> String {
    let shown = keys
        .iter()
        .take(MAX_KEYS_IN_MESSAGE)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > MAX_KEYS_IN_MESSAGE {
        format!("{shown}, ...")
    } else {
        shown
    }
}

/// Result type for cleanup operations.
pub type CleanupResult<T> = std::result::Result<T, CleanupError>;
