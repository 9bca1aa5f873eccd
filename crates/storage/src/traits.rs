//! The `ObjectStore` seam between the cleanup engine and a bucket store.

use crate::error::StorageResult;
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use std::pin::Pin;
use time::OffsetDateTime;

pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ObjectEntry>> + Send + 'a>>;

/// Keys per listing page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// S3 returns at most this many keys per ListObjectsV2 call.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    /// Size reported by the listing, in bytes.
    pub size: u64,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        Self { key, size }
    }
}

/// Entries returned by one listing call, sorted by key.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    pub objects: Vec<ObjectEntry>,
}

#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Requested keys per page, clamped to `1..=MAX_PAGE_SIZE` when used.
    pub page_size: usize,
}

impl ListingOptions {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Clone, Debug)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<OffsetDateTime>,
}

/// A flat key space split into buckets.
///
/// Buckets are passed per call since housekeeping records may point at any
/// bucket the credentials can reach.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// True when an object is stored under exactly `key`.
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Size and modification time of one object. Missing keys are `NotFound`.
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta>;

    /// Remove one object. Missing keys are not an error.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Remove up to [`MAX_PAGE_SIZE`] objects and return the keys that were
    /// confirmed gone. Keys absent from the result stay in the bucket.
    async fn delete_many(&self, bucket: &str, keys: &[String]) -> StorageResult<Vec<String>>;

    /// Pages of objects whose key starts with `prefix`.
    ///
    /// Each page is requested only when the stream is polled for it, so
    /// deleting keys of an earlier page does not shift later ones.
    fn list_pages<'a>(&'a self, bucket: &str, prefix: &str, options: ListingOptions)
    -> PageStream<'a>;

    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Per-object view over [`ObjectStore::list_pages`].
pub trait ObjectStoreExt: ObjectStore {
    fn list_entries<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        options: ListingOptions,
    ) -> EntryStream<'a> {
        let entries = self
            .list_pages(bucket, prefix, options)
            .flat_map(|page| match page {
                Ok(page) => stream::iter(page.objects).map(Ok).left_stream(),
                Err(e) => stream::once(async move { Err(e) }).right_stream(),
            });
        Box::pin(entries)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(ListingOptions::new(5000).normalized_page_size(), MAX_PAGE_SIZE);
        assert_eq!(ListingOptions::new(0).normalized_page_size(), 1);
        assert_eq!(ListingOptions::new(250).normalized_page_size(), 250);
        assert_eq!(
            ListingOptions::default().normalized_page_size(),
            DEFAULT_PAGE_SIZE
        );
    }
}
