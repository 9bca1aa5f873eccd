//! Database models mapping to the housekeeping schema.

use crate::error::{MetadataError, MetadataResult};
use beekeeper_core::{HistoryStatus, HousekeepingRecord, RecordId};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

// =============================================================================
// Housekeeping records
// =============================================================================

/// Housekeeping record row.
#[derive(Debug, Clone, FromRow)]
pub struct HousekeepingRow {
    pub id: Uuid,
    pub path: String,
    pub database_name: String,
    pub table_name: String,
    pub partition_name: Option<String>,
    pub housekeeping_status: String,
    pub creation_timestamp: OffsetDateTime,
    pub modified_timestamp: OffsetDateTime,
    pub cleanup_timestamp: OffsetDateTime,
    pub cleanup_delay_secs: i64,
    pub cleanup_attempts: i64,
    pub client_id: Option<String>,
    pub lifecycle_kind: String,
}

impl HousekeepingRow {
    /// Rehydrate the domain record. The cleanup timestamp is re-derived from
    /// the creation timestamp and delay.
    pub fn into_record(self) -> MetadataResult<HousekeepingRecord> {
        let attempts = u32::try_from(self.cleanup_attempts).map_err(|_| {
            MetadataError::InvalidRow(format!(
                "record {} has invalid cleanup_attempts {}",
                self.id, self.cleanup_attempts
            ))
        })?;

        Ok(HousekeepingRecord::builder(
            self.path,
            self.database_name,
            self.table_name,
            self.lifecycle_kind.parse()?,
        )
        .id(RecordId::from_uuid(self.id))
        .maybe_partition_name(self.partition_name)
        .status(self.housekeeping_status.parse()?)
        .creation_timestamp(self.creation_timestamp)
        .modified_timestamp(self.modified_timestamp)
        .cleanup_delay(Duration::seconds(self.cleanup_delay_secs))
        .cleanup_attempts(attempts)
        .maybe_client_id(self.client_id)
        .build())
    }
}

// =============================================================================
// History
// =============================================================================

/// Audit event recorded when a record's cleanup reaches a decision.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub record_id: Uuid,
    pub event_timestamp: OffsetDateTime,
    pub database_name: String,
    pub table_name: String,
    pub partition_name: Option<String>,
    pub path: String,
    pub lifecycle_kind: String,
    pub housekeeping_status: String,
    pub cleanup_attempts: i64,
    pub client_id: Option<String>,
}

impl HistoryRow {
    /// Snapshot a record under the given audit label.
    pub fn for_record(
        record: &HousekeepingRecord,
        status: HistoryStatus,
        event_timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: *record.id.as_uuid(),
            event_timestamp,
            database_name: record.database_name.clone(),
            table_name: record.table_name.clone(),
            partition_name: record.partition_name().map(str::to_string),
            path: record.path.clone(),
            lifecycle_kind: record.lifecycle().as_str().to_string(),
            housekeeping_status: status.as_str().to_string(),
            cleanup_attempts: i64::from(record.cleanup_attempts),
            client_id: record.client_id.clone(),
        }
    }

    /// The audit label, if it is one this version understands.
    pub fn status(&self) -> MetadataResult<HistoryStatus> {
        Ok(self.housekeeping_status.parse()?)
    }
}
