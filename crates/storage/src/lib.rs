//! Object stores the cleanup engine deletes from.
//!
//! [`ObjectStore`] is the seam. [`S3Backend`] talks to S3 or MinIO and
//! [`MemoryBackend`] keeps buckets in process with failure injection for tests.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{memory::MemoryBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{
    EntryStream, ListingOptions, ListingPage, ObjectEntry, ObjectMeta, ObjectStore, ObjectStoreExt,
    PageStream,
};

use beekeeper_core::config::StorageConfig;
use std::sync::Arc;

/// Build the configured backend.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    let StorageConfig::S3 {
        endpoint,
        region,
        access_key_id,
        secret_access_key,
        force_path_style,
    } = config.clone();
    let backend = S3Backend::new(
        endpoint,
        region,
        access_key_id,
        secret_access_key,
        force_path_style,
    )
    .await?;
    Ok(Arc::new(backend))
}
