//! Folder-marker pruning.
//!
//! Some writers leave a zero-byte `<dir>_$folder$` object next to every
//! directory they create. Once a directory's contents are gone its marker is
//! the only trace left, so after a path is cleaned we walk up the tree and
//! remove markers of ancestors that have become empty.

use beekeeper_core::ObjectPath;
use beekeeper_storage::{ListingOptions, ObjectStore, ObjectStoreExt, StorageResult};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Removes folder markers of directories emptied by a cleanup.
pub struct SentinelPruner {
    store: Arc<dyn ObjectStore>,
    listing: ListingOptions,
}

impl SentinelPruner {
    pub fn new(store: Arc<dyn ObjectStore>, listing: ListingOptions) -> Self {
        Self { store, listing }
    }

    /// Walk up from `path`'s parent, deleting markers of empty ancestors.
    ///
    /// Stops at the bucket root, at the first occupied ancestor, or at the
    /// ancestor named `table_name`. The table root itself is never pruned.
    /// Returns the number of markers removed (or that a dry run would remove).
    pub async fn prune(
        &self,
        path: &ObjectPath,
        table_name: &str,
        dry_run: bool,
    ) -> StorageResult<usize> {
        let mut removed = 0;
        let mut current = path.parent();

        while let Some(dir) = current {
            if dir.name() == table_name {
                debug!(path = %dir, "Reached table root, stopping sentinel pruning");
                break;
            }
            if !self.is_empty_directory(&dir).await? {
                debug!(path = %dir, "Directory still has contents, stopping sentinel pruning");
                break;
            }

            let sentinel = dir.sentinel_key();
            if self.store.exists(dir.bucket(), &sentinel).await? {
                if dry_run {
                    info!(bucket = dir.bucket(), key = %sentinel, "Dry run: would delete sentinel");
                } else {
                    self.store.delete(dir.bucket(), &sentinel).await?;
                    debug!(bucket = dir.bucket(), key = %sentinel, "Deleted sentinel");
                }
                removed += 1;
            }

            current = dir.parent();
        }

        Ok(removed)
    }

    /// Whether nothing lives under `dir/`.
    ///
    /// Lists with the bare directory key as prefix so that `dir/` itself is
    /// seen; siblings sharing the prefix (`dir_1`, `dir_$folder$`) do not count.
    pub async fn is_empty_directory(&self, dir: &ObjectPath) -> StorageResult<bool> {
        let prefix = dir.trimmed_key();
        let mut entries = self
            .store
            .list_entries(dir.bucket(), prefix, self.listing.clone());

        while let Some(entry) = entries.next().await {
            let entry = entry?;
            let Some(next) = entry.key[prefix.len()..].bytes().next() else {
                continue;
            };
            if next == b'/' {
                return Ok(false);
            }
            // Listings are in byte order: past '/', no child key can follow.
            if next > b'/' {
                break;
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beekeeper_storage::MemoryBackend;

    const BUCKET: &str = "bucket";

    fn pruner(backend: &Arc<MemoryBackend>) -> SentinelPruner {
        SentinelPruner::new(backend.clone(), ListingOptions::new(2))
    }

    fn path(key: &str) -> ObjectPath {
        ObjectPath::parse(&format!("s3://{BUCKET}/{key}")).unwrap()
    }

    #[tokio::test]
    async fn test_prefix_sharing_sibling_does_not_occupy() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/partition_1_$folder$", 0);
        backend.insert(BUCKET, "table/partition_10/file", 5);

        let empty = pruner(&backend)
            .is_empty_directory(&path("table/partition_1"))
            .await
            .unwrap();
        assert!(empty);
    }

    #[tokio::test]
    async fn test_child_key_occupies() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/id1/", 0);

        let empty = pruner(&backend)
            .is_empty_directory(&path("table/id1"))
            .await
            .unwrap();
        assert!(!empty);
    }

    #[tokio::test]
    async fn test_prune_cascades_and_stops_at_table_root() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "db/table_$folder$", 0);
        backend.insert(BUCKET, "db/table/id1_$folder$", 0);
        backend.insert(BUCKET, "db/table/id1/partition_1_$folder$", 0);

        let removed = pruner(&backend)
            .prune(&path("db/table/id1/partition_1/file"), "table", false)
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(backend.keys(BUCKET), ["db/table_$folder$"]);
    }

    #[tokio::test]
    async fn test_prune_stops_at_occupied_ancestor() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/id1_$folder$", 0);
        backend.insert(BUCKET, "table/id1/partition_1_$folder$", 0);
        backend.insert(BUCKET, "table/id1/partition_2/file", 7);

        let removed = pruner(&backend)
            .prune(&path("table/id1/partition_1/file"), "table", false)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(backend.contains(BUCKET, "table/id1_$folder$"));
        assert!(!backend.contains(BUCKET, "table/id1/partition_1_$folder$"));
    }

    #[tokio::test]
    async fn test_dry_run_prune_deletes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(BUCKET, "table/id1_$folder$", 0);

        let removed = pruner(&backend)
            .prune(&path("table/id1/file"), "table", true)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(backend.contains(BUCKET, "table/id1_$folder$"));
    }
}
