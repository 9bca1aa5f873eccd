use super::{Disposition, RecordHandler, RecordSettler};
use crate::catalog::CatalogError;
use crate::error::CleanupResult;
use crate::metadata_cleaner::MetadataCleaner;
use crate::path_cleaner::PathCleaner;
use async_trait::async_trait;
use beekeeper_core::{
    HistoryStatus, HousekeepingRecord, HousekeepingStatus, LifecycleKind, ObjectPath,
    PartitionSpec,
};
use beekeeper_metadata::MetadataStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Drops expired tables and partitions from the catalog and deletes their data.
///
/// A table record waits until every partition record of the same table has
/// been cleaned up, so partitions always go first.
pub struct ExpiredMetadataHandler {
    store: Arc<dyn MetadataStore>,
    metadata_cleaner: MetadataCleaner,
    path_cleaner: Arc<PathCleaner>,
    settler: RecordSettler,
    expired_data_property: String,
}

impl ExpiredMetadataHandler {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        metadata_cleaner: MetadataCleaner,
        path_cleaner: Arc<PathCleaner>,
        expired_data_property: impl Into<String>,
    ) -> Self {
        Self {
            settler: RecordSettler::new(store.clone()),
            store,
            metadata_cleaner,
            path_cleaner,
            expired_data_property: expired_data_property.into(),
        }
    }

    async fn handle_partition(
        &self,
        record: HousekeepingRecord,
        partition: PartitionSpec,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        let (database, table) = (record.database_name.as_str(), record.table_name.as_str());

        let table_exists = match self.metadata_cleaner.table_exists(database, table).await {
            Ok(exists) => exists,
            Err(e) if e.is_managed_format() => {
                return self.skip_managed(record, &e, now, dry_run).await;
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Table lookup failed");
                return self.fail(record, now, dry_run).await;
            }
        };

        if table_exists {
            match self
                .metadata_cleaner
                .drop_partition(database, table, &partition, dry_run)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_managed_format() => {
                    return self.skip_managed(record, &e, now, dry_run).await;
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        partition = %partition,
                        error = %e,
                        "Failed to drop partition, leaving its data in place"
                    );
                    return self.fail_to_delete(record, now, dry_run).await;
                }
            }
        } else {
            debug!(database, table, "Table already gone, cleaning partition data only");
        }

        self.clean_path(record, now, dry_run).await
    }

    async fn handle_table(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        let (database, table) = (record.database_name.as_str(), record.table_name.as_str());

        let pending = self
            .store
            .count_partitions_registered(database, table)
            .await?;
        if pending > 0 {
            debug!(
                record_id = %record.id,
                pending_partitions = pending,
                "Deferring table cleanup until its partitions are cleaned"
            );
            return Ok(Disposition::Deferred);
        }

        let properties = match self.metadata_cleaner.table_properties(database, table).await {
            Ok(properties) => properties,
            Err(e) if e.is_managed_format() => {
                return self.skip_managed(record, &e, now, dry_run).await;
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Failed to read table properties");
                return self.fail(record, now, dry_run).await;
            }
        };

        let enabled = properties
            .get(&self.expired_data_property)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if !enabled {
            info!(
                record_id = %record.id,
                database,
                table,
                property = %self.expired_data_property,
                "Table has not opted into expired data removal"
            );
            return self.skip(record, now, dry_run).await;
        }

        if !ObjectPath::is_valid(&record.path) {
            warn!(record_id = %record.id, path = %record.path, "Skipping record with invalid path");
            return self.skip(record, now, dry_run).await;
        }

        let table_exists = match self.metadata_cleaner.table_exists(database, table).await {
            Ok(exists) => exists,
            Err(e) if e.is_managed_format() => {
                return self.skip_managed(record, &e, now, dry_run).await;
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Table lookup failed");
                return self.fail(record, now, dry_run).await;
            }
        };
        if !table_exists {
            return self
                .settler
                .settle(record, HousekeepingStatus::Deleted, now, dry_run)
                .await;
        }

        match self
            .metadata_cleaner
            .drop_table(database, table, dry_run)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_managed_format() => {
                return self.skip_managed(record, &e, now, dry_run).await;
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Failed to drop table, leaving its data in place");
                return self.fail_to_delete(record, now, dry_run).await;
            }
        }

        self.clean_path(record, now, dry_run).await
    }

    async fn clean_path(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        match self
            .path_cleaner
            .clean(&record.path, &record.table_name, dry_run)
            .await
        {
            Ok(_) => {
                self.settler
                    .settle(record, HousekeepingStatus::Deleted, now, dry_run)
                    .await
            }
            Err(e) => {
                warn!(record_id = %record.id, path = %record.path, error = %e, "Expired data cleanup failed");
                self.fail(record, now, dry_run).await
            }
        }
    }

    async fn skip(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        self.settler
            .settle(record, HousekeepingStatus::Skipped, now, dry_run)
            .await
    }

    /// Managed-format tables are left alone and leave no history.
    async fn skip_managed(
        &self,
        record: HousekeepingRecord,
        reason: &CatalogError,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        info!(record_id = %record.id, reason = %reason, "Skipping managed-format table");
        self.settler
            .settle_with(record, HousekeepingStatus::Skipped, None, now, dry_run)
            .await
    }

    async fn fail(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        self.settler
            .settle(record, HousekeepingStatus::Failed, now, dry_run)
            .await
    }

    async fn fail_to_delete(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        self.settler
            .settle_with(
                record,
                HousekeepingStatus::Failed,
                Some(HistoryStatus::FailedToDelete),
                now,
                dry_run,
            )
            .await
    }
}

#[async_trait]
impl RecordHandler for ExpiredMetadataHandler {
    fn lifecycle(&self) -> LifecycleKind {
        LifecycleKind::Expired
    }

    async fn handle(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        if !record.is_partition() {
            return self.handle_table(record, now, dry_run).await;
        }

        let partition = match PartitionSpec::parse(record.partition_name().unwrap_or_default()) {
            Ok(partition) => partition,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Skipping record with invalid partition name");
                return self.skip(record, now, dry_run).await;
            }
        };

        if !ObjectPath::is_valid(&record.path) {
            warn!(record_id = %record.id, path = %record.path, "Skipping record with invalid path");
            return self.skip(record, now, dry_run).await;
        }

        self.handle_partition(record, partition, now, dry_run).await
    }
}
