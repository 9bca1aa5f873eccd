use super::{Disposition, RecordHandler, RecordSettler};
use crate::error::{CleanupError, CleanupResult};
use crate::path_cleaner::PathCleaner;
use async_trait::async_trait;
use beekeeper_core::{HousekeepingRecord, HousekeepingStatus, LifecycleKind, ObjectPath};
use beekeeper_metadata::MetadataStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;

/// Deletes data paths that no table references any more.
pub struct UnreferencedPathHandler {
    path_cleaner: Arc<PathCleaner>,
    settler: RecordSettler,
}

impl UnreferencedPathHandler {
    pub fn new(store: Arc<dyn MetadataStore>, path_cleaner: Arc<PathCleaner>) -> Self {
        Self {
            path_cleaner,
            settler: RecordSettler::new(store),
        }
    }
}

#[async_trait]
impl RecordHandler for UnreferencedPathHandler {
    fn lifecycle(&self) -> LifecycleKind {
        LifecycleKind::Unreferenced
    }

    async fn handle(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        if !ObjectPath::is_valid(&record.path) {
            warn!(record_id = %record.id, path = %record.path, "Skipping record with invalid path");
            return self
                .settler
                .settle(record, HousekeepingStatus::Skipped, now, dry_run)
                .await;
        }

        let status = match self
            .path_cleaner
            .clean(&record.path, &record.table_name, dry_run)
            .await
        {
            Ok(_) => HousekeepingStatus::Deleted,
            Err(CleanupError::InvalidPath(_)) => HousekeepingStatus::Skipped,
            Err(e) => {
                warn!(record_id = %record.id, path = %record.path, error = %e, "Unreferenced path cleanup failed");
                HousekeepingStatus::Failed
            }
        };

        self.settler.settle(record, status, now, dry_run).await
    }
}
