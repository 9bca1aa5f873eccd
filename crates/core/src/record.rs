//! Housekeeping records and their lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Unique identifier for a housekeeping record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a record was scheduled for cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleKind {
    /// Data past its retention window; cleanup covers catalog metadata and data.
    Expired,
    /// Data orphaned by a metadata operation; cleanup covers the path only.
    Unreferenced,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "EXPIRED",
            Self::Unreferenced => "UNREFERENCED",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "EXPIRED" => Ok(Self::Expired),
            "UNREFERENCED" => Ok(Self::Unreferenced),
            other => Err(crate::Error::UnknownLifecycle(other.to_string())),
        }
    }
}

/// Persisted state of a housekeeping record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HousekeepingStatus {
    /// Waiting for its cleanup timestamp.
    Scheduled,
    /// Data (and metadata, if any) has been removed.
    Deleted,
    /// The last attempt failed; retried on the next cycle.
    Failed,
    /// Intentionally not cleaned.
    Skipped,
    /// Cleanup was turned off for this record.
    Disabled,
}

impl HousekeepingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for HousekeepingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HousekeepingStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "SCHEDULED" => Ok(Self::Scheduled),
            "DELETED" => Ok(Self::Deleted),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            "DISABLED" => Ok(Self::Disabled),
            other => Err(crate::Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Audit label written to the history store.
///
/// A superset of [`HousekeepingStatus`]: a failed catalog drop is audited as
/// `FAILED_TO_DELETE` while the record itself is persisted as `FAILED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryStatus {
    Scheduled,
    Deleted,
    Failed,
    Skipped,
    Disabled,
    FailedToDelete,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Disabled => "DISABLED",
            Self::FailedToDelete => "FAILED_TO_DELETE",
        }
    }
}

impl From<HousekeepingStatus> for HistoryStatus {
    fn from(status: HousekeepingStatus) -> Self {
        match status {
            HousekeepingStatus::Scheduled => Self::Scheduled,
            HousekeepingStatus::Deleted => Self::Deleted,
            HousekeepingStatus::Failed => Self::Failed,
            HousekeepingStatus::Skipped => Self::Skipped,
            HousekeepingStatus::Disabled => Self::Disabled,
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "FAILED_TO_DELETE" => Ok(Self::FailedToDelete),
            other => other.parse::<HousekeepingStatus>().map(Self::from),
        }
    }
}

/// Truncate a timestamp to whole seconds.
///
/// Record timestamps are persisted and compared at second precision.
pub fn whole_seconds(ts: OffsetDateTime) -> OffsetDateTime {
    ts.replace_nanosecond(0).unwrap_or(ts)
}

/// A unit of cleanup work: one object-store path, optionally tied to a
/// catalog table or partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HousekeepingRecord {
    pub id: RecordId,
    /// Object-store URI of the data to remove.
    pub path: String,
    pub database_name: String,
    pub table_name: String,
    /// Present for partition-level records. Never changes after creation.
    partition_name: Option<String>,
    pub status: HousekeepingStatus,
    creation_timestamp: OffsetDateTime,
    pub modified_timestamp: OffsetDateTime,
    cleanup_timestamp: OffsetDateTime,
    cleanup_delay: Duration,
    pub cleanup_attempts: u32,
    pub client_id: Option<String>,
    lifecycle: LifecycleKind,
}

impl HousekeepingRecord {
    /// Start building a record scheduled from the current time.
    pub fn builder(
        path: impl Into<String>,
        database_name: impl Into<String>,
        table_name: impl Into<String>,
        lifecycle: LifecycleKind,
    ) -> HousekeepingRecordBuilder {
        HousekeepingRecordBuilder::new(
            path.into(),
            database_name.into(),
            table_name.into(),
            lifecycle,
        )
    }

    pub fn partition_name(&self) -> Option<&str> {
        self.partition_name.as_deref()
    }

    /// Whether this record describes a single partition rather than a whole table.
    pub fn is_partition(&self) -> bool {
        self.partition_name.is_some()
    }

    pub fn lifecycle(&self) -> LifecycleKind {
        self.lifecycle
    }

    pub fn creation_timestamp(&self) -> OffsetDateTime {
        self.creation_timestamp
    }

    pub fn cleanup_timestamp(&self) -> OffsetDateTime {
        self.cleanup_timestamp
    }

    pub fn cleanup_delay(&self) -> Duration {
        self.cleanup_delay
    }

    /// Change the cleanup delay, moving the cleanup timestamp with it.
    pub fn set_cleanup_delay(&mut self, delay: Duration) {
        self.cleanup_delay = delay;
        self.cleanup_timestamp = self.creation_timestamp + delay;
    }
}

/// Builder for [`HousekeepingRecord`].
///
/// Also used by stores to rehydrate persisted rows; the cleanup timestamp is
/// always derived from the creation timestamp and delay.
#[derive(Clone, Debug)]
pub struct HousekeepingRecordBuilder {
    id: RecordId,
    path: String,
    database_name: String,
    table_name: String,
    partition_name: Option<String>,
    status: HousekeepingStatus,
    creation_timestamp: OffsetDateTime,
    modified_timestamp: Option<OffsetDateTime>,
    cleanup_delay: Duration,
    cleanup_attempts: u32,
    client_id: Option<String>,
    lifecycle: LifecycleKind,
}

impl HousekeepingRecordBuilder {
    fn new(
        path: String,
        database_name: String,
        table_name: String,
        lifecycle: LifecycleKind,
    ) -> Self {
        Self {
            id: RecordId::new(),
            path,
            database_name,
            table_name,
            partition_name: None,
            status: HousekeepingStatus::Scheduled,
            creation_timestamp: OffsetDateTime::now_utc(),
            modified_timestamp: None,
            cleanup_delay: Duration::ZERO,
            cleanup_attempts: 0,
            client_id: None,
            lifecycle,
        }
    }

    pub fn id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    pub fn partition_name(mut self, partition_name: impl Into<String>) -> Self {
        self.partition_name = Some(partition_name.into());
        self
    }

    pub fn maybe_partition_name(mut self, partition_name: Option<String>) -> Self {
        self.partition_name = partition_name;
        self
    }

    pub fn status(mut self, status: HousekeepingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn creation_timestamp(mut self, ts: OffsetDateTime) -> Self {
        self.creation_timestamp = ts;
        self
    }

    /// Defaults to the creation timestamp.
    pub fn modified_timestamp(mut self, ts: OffsetDateTime) -> Self {
        self.modified_timestamp = Some(ts);
        self
    }

    pub fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn cleanup_attempts(mut self, attempts: u32) -> Self {
        self.cleanup_attempts = attempts;
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn maybe_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn build(self) -> HousekeepingRecord {
        let creation_timestamp = whole_seconds(self.creation_timestamp);
        let modified_timestamp = whole_seconds(self.modified_timestamp.unwrap_or(creation_timestamp));
        HousekeepingRecord {
            id: self.id,
            path: self.path,
            database_name: self.database_name,
            table_name: self.table_name,
            partition_name: self.partition_name,
            status: self.status,
            creation_timestamp,
            modified_timestamp,
            cleanup_timestamp: creation_timestamp + self.cleanup_delay,
            cleanup_delay: self.cleanup_delay,
            cleanup_attempts: self.cleanup_attempts,
            client_id: self.client_id,
            lifecycle: self.lifecycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record() -> HousekeepingRecord {
        HousekeepingRecord::builder(
            "s3://bucket/db/table/partition=1",
            "db",
            "table",
            LifecycleKind::Expired,
        )
        .partition_name("partition=1")
        .creation_timestamp(datetime!(2024-03-01 12:00:00.750 UTC))
        .cleanup_delay(Duration::days(3))
        .build()
    }

    #[test]
    fn test_cleanup_timestamp_derived_from_delay() {
        let record = record();
        assert_eq!(record.creation_timestamp(), datetime!(2024-03-01 12:00:00 UTC));
        assert_eq!(record.cleanup_timestamp(), datetime!(2024-03-04 12:00:00 UTC));
        assert_eq!(record.modified_timestamp, record.creation_timestamp());
    }

    #[test]
    fn test_set_cleanup_delay_moves_cleanup_timestamp() {
        let mut record = record();
        record.set_cleanup_delay(Duration::hours(6));
        assert_eq!(record.cleanup_delay(), Duration::hours(6));
        assert_eq!(record.cleanup_timestamp(), datetime!(2024-03-01 18:00:00 UTC));
    }

    #[test]
    fn test_partition_records() {
        let partition = record();
        assert!(partition.is_partition());
        assert_eq!(partition.partition_name(), Some("partition=1"));

        let table =
            HousekeepingRecord::builder("s3://bucket/db/table", "db", "table", LifecycleKind::Expired)
                .build();
        assert!(!table.is_partition());
        assert_eq!(table.partition_name(), None);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            HousekeepingStatus::Scheduled,
            HousekeepingStatus::Deleted,
            HousekeepingStatus::Failed,
            HousekeepingStatus::Skipped,
            HousekeepingStatus::Disabled,
        ] {
            assert_eq!(status.as_str().parse::<HousekeepingStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<HousekeepingStatus>().is_err());
    }

    #[test]
    fn test_history_status_labels() {
        assert_eq!(HistoryStatus::FailedToDelete.as_str(), "FAILED_TO_DELETE");
        assert_eq!(
            "FAILED_TO_DELETE".parse::<HistoryStatus>().unwrap(),
            HistoryStatus::FailedToDelete
        );
        assert_eq!(
            HistoryStatus::from(HousekeepingStatus::Skipped),
            HistoryStatus::Skipped
        );
    }

    #[test]
    fn test_lifecycle_serde_uses_upper_case() {
        let json = serde_json::to_string(&LifecycleKind::Unreferenced).unwrap();
        assert_eq!(json, "\"UNREFERENCED\"");
        let parsed: LifecycleKind = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(parsed, LifecycleKind::Expired);
    }
}
