//! In-memory object store.
//!
//! Holds object sizes only. Used for local dry runs and as the object store
//! in tests, with switches for simulating outages and rejected deletes.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ListingOptions, ListingPage, ObjectEntry, ObjectMeta, ObjectStore, PageStream};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, u64>>,
    rejected: HashSet<(String, String)>,
}

/// Object store backed by a map of bucket -> key -> size.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    unavailable: AtomicBool,
    delete_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("objects", &self.object_count())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }

    /// Store an object of the given size, replacing any existing one.
    pub fn insert(&self, bucket: &str, key: &str, size: u64) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), size);
    }

    /// Whether an object is stored at exactly this key.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    /// All keys in a bucket, in order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_count(&self) -> usize {
        self.state().buckets.values().map(BTreeMap::len).sum()
    }

    /// Make every subsequent delete of this key fail silently in batch
    /// deletes and loudly in single deletes.
    pub fn reject_delete(&self, bucket: &str, key: &str) {
        self.state()
            .rejected
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Simulate an outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of delete and batch delete calls made so far.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of listing pages served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn page_after(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<&str>,
        page_size: usize,
    ) -> StorageResult<Vec<ObjectEntry>> {
        self.check_available()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        let Some(objects) = state.buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let lower = match start_after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        Ok(objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(page_size)
            .map(|(key, size)| ObjectEntry::new(key.clone(), *size))
            .collect())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self.contains(bucket, key))
    }

    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        self.check_available()?;
        let size = self
            .state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).copied())
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))?;

        Ok(ObjectMeta {
            size,
            last_modified: None,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.check_available()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if state
            .rejected
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("access denied deleting {bucket}/{key}"),
            )));
        }
        if let Some(objects) = state.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_many(&self, bucket: &str, keys: &[String]) -> StorageResult<Vec<String>> {
        self.check_available()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        let State { buckets, rejected } = &mut *state;
        let mut confirmed = Vec::with_capacity(keys.len());
        for key in keys {
            if rejected.contains(&(bucket.to_string(), key.clone())) {
                continue;
            }
            if let Some(objects) = buckets.get_mut(bucket) {
                objects.remove(key);
            }
            confirmed.push(key.clone());
        }
        Ok(confirmed)
    }

    fn list_pages<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        options: ListingOptions,
    ) -> PageStream<'a> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        let stream = async_stream::try_stream! {
            let mut start_after: Option<String> = None;

            loop {
                let objects = self.page_after(&bucket, &prefix, start_after.as_deref(), page_size)?;
                let has_more = objects.len() == page_size;
                start_after = objects.last().map(|entry| entry.key.clone());

                if !objects.is_empty() {
                    yield ListingPage { objects };
                }

                if !has_more {
                    break;
                }
            }
        };

        Box::pin(stream)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ObjectStoreExt;
    use futures::{StreamExt, TryStreamExt};

    #[tokio::test]
    async fn test_list_pages_respects_prefix_and_page_size() {
        let store = MemoryBackend::new();
        for i in 0..5 {
            store.insert("bucket", &format!("table/partition_1/file-{i}"), 10);
        }
        store.insert("bucket", "table/partition_10/file-0", 10);
        store.insert("bucket", "table/partition_1_$folder$", 0);

        let pages: Vec<ListingPage> = store
            .list_pages("bucket", "table/partition_1/", ListingOptions::new(2))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            pages.iter().map(|p| p.objects.len()).collect::<Vec<_>>(),
            [2, 2, 1]
        );
        assert!(
            pages
                .iter()
                .flat_map(|p| &p.objects)
                .all(|o| o.key.starts_with("table/partition_1/"))
        );
    }

    #[tokio::test]
    async fn test_listing_survives_deletes_between_pages() {
        let store = MemoryBackend::new();
        for i in 0..6 {
            store.insert("bucket", &format!("dir/{i}"), 1);
        }

        let mut pages = store.list_pages("bucket", "dir/", ListingOptions::new(2));
        let mut seen = Vec::new();
        while let Some(page) = pages.next().await {
            let keys: Vec<String> = page.unwrap().objects.into_iter().map(|o| o.key).collect();
            store.delete_many("bucket", &keys).await.unwrap();
            seen.extend(keys);
        }

        assert_eq!(seen.len(), 6);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_many_omits_rejected_keys() {
        let store = MemoryBackend::new();
        store.insert("bucket", "a", 1);
        store.insert("bucket", "b", 1);
        store.reject_delete("bucket", "b");

        let confirmed = store
            .delete_many("bucket", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(confirmed, ["a"]);
        assert!(store.contains("bucket", "b"));
        assert!(store.delete("bucket", "b").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemoryBackend::new();
        store.delete("bucket", "missing").await.unwrap();
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryBackend::new();
        store.insert("bucket", "a", 1);
        store.set_unavailable(true);

        assert!(matches!(
            store.exists("bucket", "a").await,
            Err(StorageError::Unavailable(_))
        ));
        let mut entries = store.list_entries("bucket", "", ListingOptions::default());
        assert!(entries.next().await.unwrap().is_err());

        store.set_unavailable(false);
        assert_eq!(store.head("bucket", "a").await.unwrap().size, 1);
    }
}
