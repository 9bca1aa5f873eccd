//! Housekeeping record repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use beekeeper_core::{HousekeepingRecord, LifecycleKind, RecordId};
use time::OffsetDateTime;

/// A fixed-size window into an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number.
    pub index: u32,
    /// Rows per page.
    pub size: u32,
}

impl PageRequest {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    pub fn first(size: u32) -> Self {
        Self::new(0, size)
    }

    pub fn next(&self) -> Self {
        Self::new(self.index.saturating_add(1), self.size)
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// A page shorter than requested is the last one.
    pub fn is_last(&self) -> bool {
        self.items.len() < self.request.size as usize
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Repository for housekeeping records.
#[async_trait]
pub trait HousekeepingRepo: Send + Sync {
    /// Insert a new record. Fails with a constraint error when an
    /// UNREFERENCED record for the same path already exists.
    async fn create_record(&self, record: &HousekeepingRecord) -> MetadataResult<()>;

    /// Get a record by ID.
    async fn get_record(&self, id: RecordId) -> MetadataResult<Option<HousekeepingRecord>>;

    /// Page through records of one lifecycle kind that are due at `now`.
    ///
    /// A record is returned when its status is SCHEDULED or FAILED, its
    /// cleanup timestamp is not after `now`, and it has not been modified at
    /// or after `now`. Results are ordered by path, then ID.
    async fn page_eligible(
        &self,
        lifecycle: LifecycleKind,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> MetadataResult<Page<HousekeepingRecord>>;

    /// Count partition records of a table that are still waiting for cleanup.
    async fn count_partitions_registered(
        &self,
        database_name: &str,
        table_name: &str,
    ) -> MetadataResult<u64>;

    /// Persist a record's mutable fields.
    async fn save(&self, record: &HousekeepingRecord) -> MetadataResult<()>;

    /// Delete DELETED records whose cleanup timestamp is before `cutoff`.
    async fn purge_deleted_older_than(&self, cutoff: OffsetDateTime) -> MetadataResult<u64>;

    /// Delete the pending partition records of a table.
    async fn delete_child_partition_records(
        &self,
        database_name: &str,
        table_name: &str,
    ) -> MetadataResult<u64>;
}
