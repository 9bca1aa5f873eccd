//! Shared fixtures: a SQLite record store in a temp dir, an in-memory
//! object store and an in-memory catalog wired into a cleanup service.

#![allow(dead_code)]

use beekeeper_cleanup::{
    ExpiredMetadataHandler, MemoryCatalog, MetadataCleaner, PagingCleanupService, PathCleaner,
    PathCleanerOptions, RecordHandler, UnreferencedPathHandler,
};
use beekeeper_core::{
    DEFAULT_EXPIRED_DATA_PROPERTY, HistoryStatus, HousekeepingRecord, HousekeepingStatus,
    LifecycleKind,
};
use beekeeper_metadata::{HistoryRepo, HousekeepingRepo, MetadataStore, SqliteStore};
use beekeeper_storage::MemoryBackend;
use std::sync::Arc;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

pub const BUCKET: &str = "bucket";

pub struct TestContext {
    pub store: Arc<SqliteStore>,
    pub backend: Arc<MemoryBackend>,
    pub catalog: Arc<MemoryCatalog>,
    pub service: PagingCleanupService,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Small record pages so that paging is exercised.
    pub async fn new() -> Self {
        Self::with_page_size(2).await
    }

    pub async fn with_page_size(page_size: u32) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("beekeeper.db"), None)
                .await
                .unwrap(),
        );
        let backend = Arc::new(MemoryBackend::new());
        let catalog = Arc::new(MemoryCatalog::new());

        let metadata: Arc<dyn MetadataStore> = store.clone();
        let path_cleaner = Arc::new(PathCleaner::new(
            backend.clone(),
            PathCleanerOptions {
                listing_page_size: 1000,
                delete_batch_size: 1000,
            },
        ));
        let handlers: Vec<Arc<dyn RecordHandler>> = vec![
            Arc::new(UnreferencedPathHandler::new(
                metadata.clone(),
                path_cleaner.clone(),
            )),
            Arc::new(ExpiredMetadataHandler::new(
                metadata.clone(),
                MetadataCleaner::new(catalog.clone()),
                path_cleaner,
                DEFAULT_EXPIRED_DATA_PROPERTY,
            )),
        ];
        let service = PagingCleanupService::new(metadata, handlers, page_size);

        Self {
            store,
            backend,
            catalog,
            service,
            _temp_dir: temp_dir,
        }
    }

    pub async fn insert(&self, record: &HousekeepingRecord) {
        self.store.create_record(record).await.unwrap();
    }

    pub async fn reload(&self, record: &HousekeepingRecord) -> HousekeepingRecord {
        self.store.get_record(record.id).await.unwrap().unwrap()
    }

    pub async fn history(&self, record: &HousekeepingRecord) -> Vec<HistoryStatus> {
        self.store
            .history_for_record(*record.id.as_uuid())
            .await
            .unwrap()
            .iter()
            .map(|event| event.status().unwrap())
            .collect()
    }

    pub async fn assert_settled(
        &self,
        record: &HousekeepingRecord,
        status: HousekeepingStatus,
        attempts: u32,
    ) {
        let loaded = self.reload(record).await;
        assert_eq!(loaded.status, status, "status of {}", record.path);
        assert_eq!(loaded.cleanup_attempts, attempts, "attempts of {}", record.path);
    }

    pub fn put(&self, key: &str, size: u64) {
        self.backend.insert(BUCKET, key, size);
    }

    pub fn keys(&self) -> Vec<String> {
        self.backend.keys(BUCKET)
    }
}

/// The cycle time. Handlers stamp records with the wall clock, so tests use it too.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn created() -> OffsetDateTime {
    now() - Duration::days(10)
}

pub fn unreferenced(key: &str, table: &str) -> HousekeepingRecord {
    HousekeepingRecord::builder(
        format!("s3://{BUCKET}/{key}"),
        "db",
        table,
        LifecycleKind::Unreferenced,
    )
    .creation_timestamp(created())
    .cleanup_delay(Duration::days(1))
    .build()
}

pub fn expired_table(key: &str, table: &str) -> HousekeepingRecord {
    HousekeepingRecord::builder(
        format!("s3://{BUCKET}/{key}"),
        "db",
        table,
        LifecycleKind::Expired,
    )
    .creation_timestamp(created())
    .cleanup_delay(Duration::days(1))
    .build()
}

pub fn expired_partition(key: &str, table: &str, partition: &str) -> HousekeepingRecord {
    HousekeepingRecord::builder(
        format!("s3://{BUCKET}/{key}"),
        "db",
        table,
        LifecycleKind::Expired,
    )
    .partition_name(partition)
    .creation_timestamp(created())
    .cleanup_delay(Duration::days(1))
    .build()
}
