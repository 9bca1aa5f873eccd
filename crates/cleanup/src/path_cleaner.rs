//! Object-store path deletion.

use crate::bytes::BytesAccountant;
use crate::error::{CleanupError, CleanupResult};
use crate::metrics;
use crate::sentinel::SentinelPruner;
use beekeeper_core::ObjectPath;
use beekeeper_core::config::{CleanupConfig, MAX_DELETE_BATCH_SIZE};
use beekeeper_storage::{ListingOptions, ObjectStore};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Listing and batching knobs for [`PathCleaner`].
#[derive(Debug, Clone, Copy)]
pub struct PathCleanerOptions {
    pub listing_page_size: usize,
    pub delete_batch_size: usize,
}

impl Default for PathCleanerOptions {
    fn default() -> Self {
        Self {
            listing_page_size: 1000,
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
        }
    }
}

impl From<&CleanupConfig> for PathCleanerOptions {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            listing_page_size: config.listing_page_size,
            delete_batch_size: config.delete_batch_size,
        }
    }
}

/// What a `clean` call removed, or would have removed in a dry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub bytes_freed: u64,
    pub objects_deleted: u64,
}

/// Deletes a single object or a whole directory tree, then prunes folder
/// markers left behind by the deletion.
pub struct PathCleaner {
    store: Arc<dyn ObjectStore>,
    options: PathCleanerOptions,
    pruner: SentinelPruner,
}

impl PathCleaner {
    pub fn new(store: Arc<dyn ObjectStore>, options: PathCleanerOptions) -> Self {
        let listing = ListingOptions::new(options.listing_page_size);
        Self {
            pruner: SentinelPruner::new(store.clone(), listing),
            store,
            options: PathCleanerOptions {
                delete_batch_size: options.delete_batch_size.clamp(1, MAX_DELETE_BATCH_SIZE),
                ..options
            },
        }
    }

    /// Delete everything at `path`.
    ///
    /// A key without a trailing separator is first tried as a single object;
    /// otherwise every key under `path/` is deleted in batches, followed by the
    /// directory's own folder marker. Sentinel pruning up to the table root
    /// runs after every outcome and only logs its own failures.
    pub async fn clean(
        &self,
        path: &str,
        table_name: &str,
        dry_run: bool,
    ) -> CleanupResult<CleanupSummary> {
        let path =
            ObjectPath::parse(path).map_err(|e| CleanupError::InvalidPath(e.to_string()))?;

        let mut summary = CleanupSummary::default();
        let outcome = self.delete_path(&path, dry_run, &mut summary).await;
        metrics::record_objects_deleted(summary.objects_deleted, summary.bytes_freed, dry_run);

        self.prune_sentinels(&path, table_name, dry_run).await;

        match outcome {
            Ok(()) => {
                info!(
                    path = %path,
                    objects = summary.objects_deleted,
                    bytes = summary.bytes_freed,
                    dry_run,
                    "Cleaned path"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Failed to clean path");
                Err(err)
            }
        }
    }

    async fn delete_path(
        &self,
        path: &ObjectPath,
        dry_run: bool,
        summary: &mut CleanupSummary,
    ) -> CleanupResult<()> {
        if !path.is_directory_hint()
            && let Some(size) = self.object_size(path.bucket(), path.key()).await?
        {
            self.delete_object(path.bucket(), path.key(), dry_run).await?;
            summary.objects_deleted += 1;
            summary.bytes_freed += size;
            return Ok(());
        }

        self.delete_directory(path, dry_run, summary).await
    }

    async fn delete_directory(
        &self,
        path: &ObjectPath,
        dry_run: bool,
        summary: &mut CleanupSummary,
    ) -> CleanupResult<()> {
        let bucket = path.bucket();
        let prefix = path.directory_prefix();
        let mut accountant = BytesAccountant::new();
        let mut undeleted = Vec::new();

        let mut pages = self.store.list_pages(
            bucket,
            &prefix,
            ListingOptions::new(self.options.listing_page_size),
        );

        while let Some(page) = pages.next().await {
            let page = page?;
            let keys: Vec<String> = page.objects.iter().map(|o| o.key.clone()).collect();
            for object in page.objects {
                accountant.remember_size(object.key, object.size);
            }

            for batch in keys.chunks(self.options.delete_batch_size) {
                if dry_run {
                    for key in batch {
                        info!(bucket, key = %key, "Dry run: would delete object");
                    }
                    summary.bytes_freed += accountant.settle(batch);
                    summary.objects_deleted += batch.len() as u64;
                    continue;
                }

                let confirmed = self.store.delete_many(bucket, batch).await?;
                summary.bytes_freed += accountant.settle(&confirmed);
                summary.objects_deleted += confirmed.len() as u64;

                if confirmed.len() < batch.len() {
                    let confirmed: HashSet<&str> = confirmed.iter().map(String::as_str).collect();
                    undeleted.extend(
                        batch
                            .iter()
                            .filter(|key| !confirmed.contains(key.as_str()))
                            .cloned(),
                    );
                }
            }
        }

        if !undeleted.is_empty() {
            return Err(CleanupError::PartialDeletion {
                path: path.to_string(),
                undeleted,
                bytes_freed: summary.bytes_freed,
            });
        }

        let sentinel = path.sentinel_key();
        if let Some(size) = self.object_size(bucket, &sentinel).await? {
            self.delete_object(bucket, &sentinel, dry_run).await?;
            summary.objects_deleted += 1;
            summary.bytes_freed += size;
        }

        Ok(())
    }

    /// Size of the object at exactly `key`, or `None` if there is none.
    async fn object_size(&self, bucket: &str, key: &str) -> CleanupResult<Option<u64>> {
        match self.store.head(bucket, key).await {
            Ok(meta) => Ok(Some(meta.size)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str, dry_run: bool) -> CleanupResult<()> {
        if dry_run {
            info!(bucket, key, "Dry run: would delete object");
        } else {
            self.store.delete(bucket, key).await?;
            debug!(bucket, key, "Deleted object");
        }
        Ok(())
    }

    async fn prune_sentinels(&self, path: &ObjectPath, table_name: &str, dry_run: bool) {
        // Cleaning the table root itself leaves nothing to prune below it.
        if path.name() == table_name {
            return;
        }
        if let Err(e) = self.pruner.prune(path, table_name, dry_run).await {
            warn!(path = %path, error = %e, "Failed to prune sentinel files");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beekeeper_storage::MemoryBackend;

    const BUCKET: &str = "bucket";

    fn cleaner(backend: &Arc<MemoryBackend>, batch: usize) -> PathCleaner {
        PathCleaner::new(
            backend.clone(),
            PathCleanerOptions {
                listing_page_size: 3,
                delete_batch_size: batch,
            },
        )
    }

    #[tokio::test]
    async fn test_clean_single_object() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/file.parquet", 42);
        backend.insert(BUCKET, "table/file.parquet.crc", 1);

        let summary = cleaner(&backend, 10)
            .clean("s3://bucket/table/file.parquet", "table", false)
            .await
            .unwrap();

        assert_eq!(summary.bytes_freed, 42);
        assert_eq!(summary.objects_deleted, 1);
        assert_eq!(backend.keys(BUCKET), ["table/file.parquet.crc"]);
    }

    #[tokio::test]
    async fn test_clean_directory_across_pages_and_batches() {
        let backend = Arc::new(MemoryBackend::new());
        for i in 0..7 {
            backend.insert(BUCKET, &format!("table/dir/file-{i}"), 10);
        }
        backend.insert(BUCKET, "table/dir_$folder$", 0);

        let summary = cleaner(&backend, 2)
            .clean("s3://bucket/table/dir", "table", false)
            .await
            .unwrap();

        assert_eq!(summary.bytes_freed, 70);
        assert_eq!(summary.objects_deleted, 8);
        assert_eq!(backend.object_count(), 0);
    }

    #[tokio::test]
    async fn test_trailing_separator_skips_object_check() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/dir/a", 1);

        let summary = cleaner(&backend, 10)
            .clean("s3://bucket/table/dir/", "table", false)
            .await
            .unwrap();

        assert_eq!(summary.objects_deleted, 1);
        assert_eq!(backend.object_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_path_is_a_successful_no_op() {
        let backend = Arc::new(MemoryBackend::new());

        let summary = cleaner(&backend, 10)
            .clean("s3://bucket/table/gone", "table", false)
            .await
            .unwrap();

        assert_eq!(summary, CleanupSummary::default());
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());

        let err = cleaner(&backend, 10)
            .clean("not-a-uri", "table", false)
            .await
            .unwrap_err();

        assert!(matches!(err, CleanupError::InvalidPath(_)));
        assert_eq!(backend.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_deletion_keeps_own_sentinel() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/dir/a", 5);
        backend.insert(BUCKET, "table/dir/b", 7);
        backend.insert(BUCKET, "table/dir_$folder$", 0);
        backend.reject_delete(BUCKET, "table/dir/b");

        let err = cleaner(&backend, 10)
            .clean("s3://bucket/table/dir", "table", false)
            .await
            .unwrap_err();

        match err {
            CleanupError::PartialDeletion {
                undeleted,
                bytes_freed,
                ..
            } => {
                assert_eq!(undeleted, ["table/dir/b"]);
                assert_eq!(bytes_freed, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(backend.contains(BUCKET, "table/dir_$folder$"));
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_deleting() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/dir/a", 5);
        backend.insert(BUCKET, "table/dir/b", 7);

        let summary = cleaner(&backend, 10)
            .clean("s3://bucket/table/dir", "table", true)
            .await
            .unwrap();

        assert_eq!(summary.bytes_freed, 12);
        assert_eq!(summary.objects_deleted, 2);
        assert_eq!(backend.object_count(), 2);
        assert_eq!(backend.delete_calls(), 0);
    }
}
