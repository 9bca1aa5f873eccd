//! The SQLite-backed housekeeping store.

use crate::error::MetadataResult;
use crate::repos::{HistoryRepo, HousekeepingRepo};
use async_trait::async_trait;
use beekeeper_core::record::whole_seconds;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

/// Records and history behind one handle, plus schema and liveness.
#[async_trait]
pub trait MetadataStore: HousekeepingRepo + HistoryRepo + Send + Sync {
    /// Create missing tables and indexes. Safe to run repeatedly.
    async fn migrate(&self) -> MetadataResult<()>;

    async fn health_check(&self) -> MetadataResult<()>;
}

/// Timestamps are stored as RFC 3339 text. UTC at whole seconds keeps text
/// order equal to time order.
fn db_time(ts: OffsetDateTime) -> OffsetDateTime {
    whole_seconds(ts.to_offset(UtcOffset::UTC))
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    ///
    /// `busy_timeout_secs` bounds how long a write waits on a locked database.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(
                busy_timeout_secs.unwrap_or(DEFAULT_BUSY_TIMEOUT_SECS),
            ));

        // The cleanup loop and the retention loop write from separate tasks.
        // One connection serializes them.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "Opened SQLite housekeeping store");
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::error::MetadataError;
    use crate::models::*;
    use crate::repos::{Page, PageRequest};
    use beekeeper_core::{HousekeepingRecord, HousekeepingStatus, LifecycleKind, RecordId};
    use uuid::Uuid;

    const PENDING_STATUSES: &str = "('SCHEDULED', 'FAILED')";

    #[async_trait]
    impl HousekeepingRepo for SqliteStore {
        async fn create_record(&self, record: &HousekeepingRecord) -> MetadataResult<()> {
            let inserted = sqlx::query(
                r#"
                INSERT INTO housekeeping_records (
                    id, path, database_name, table_name, partition_name, housekeeping_status,
                    creation_timestamp, modified_timestamp, cleanup_timestamp,
                    cleanup_delay_secs, cleanup_attempts, client_id, lifecycle_kind
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(*record.id.as_uuid())
            .bind(&record.path)
            .bind(&record.database_name)
            .bind(&record.table_name)
            .bind(record.partition_name())
            .bind(record.status.as_str())
            .bind(db_time(record.creation_timestamp()))
            .bind(db_time(record.modified_timestamp))
            .bind(db_time(record.cleanup_timestamp()))
            .bind(record.cleanup_delay().whole_seconds())
            .bind(i64::from(record.cleanup_attempts))
            .bind(record.client_id.as_deref())
            .bind(record.lifecycle().as_str())
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    Err(MetadataError::Constraint(format!(
                        "unreferenced record for {} already stored",
                        record.path
                    )))
                }
                Err(e) => Err(e.into()),
            }
        }

        async fn get_record(&self, id: RecordId) -> MetadataResult<Option<HousekeepingRecord>> {
            let row = sqlx::query_as::<_, HousekeepingRow>(
                "SELECT * FROM housekeeping_records WHERE id = ?",
            )
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            row.map(HousekeepingRow::into_record).transpose()
        }

        async fn page_eligible(
            &self,
            lifecycle: LifecycleKind,
            now: OffsetDateTime,
            page: PageRequest,
        ) -> MetadataResult<Page<HousekeepingRecord>> {
            let now = db_time(now);
            let offset = i64::try_from(page.offset()).map_err(|_| {
                MetadataError::Internal(format!("page offset {} out of range", page.offset()))
            })?;

            let rows = sqlx::query_as::<_, HousekeepingRow>(&format!(
                r#"
                SELECT * FROM housekeeping_records
                WHERE lifecycle_kind = ?
                  AND housekeeping_status IN {PENDING_STATUSES}
                  AND cleanup_timestamp <= ?
                  AND modified_timestamp < ?
                ORDER BY path, id
                LIMIT ? OFFSET ?
                "#
            ))
            .bind(lifecycle.as_str())
            .bind(now)
            .bind(now)
            .bind(i64::from(page.size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            let items = rows
                .into_iter()
                .map(HousekeepingRow::into_record)
                .collect::<MetadataResult<Vec<_>>>()?;

            Ok(Page {
                items,
                request: page,
            })
        }

        async fn count_partitions_registered(
            &self,
            database_name: &str,
            table_name: &str,
        ) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(&format!(
                r#"
                SELECT COUNT(*) FROM housekeeping_records
                WHERE database_name = ?
                  AND table_name = ?
                  AND lifecycle_kind = ?
                  AND partition_name IS NOT NULL
                  AND housekeeping_status IN {PENDING_STATUSES}
                "#
            ))
            .bind(database_name)
            .bind(table_name)
            .bind(LifecycleKind::Expired.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(count.max(0) as u64)
        }

        async fn save(&self, record: &HousekeepingRecord) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE housekeeping_records
                SET path = ?, housekeeping_status = ?, modified_timestamp = ?,
                    cleanup_timestamp = ?, cleanup_delay_secs = ?, cleanup_attempts = ?,
                    client_id = ?
                WHERE id = ?
                "#,
            )
            .bind(&record.path)
            .bind(record.status.as_str())
            .bind(db_time(record.modified_timestamp))
            .bind(db_time(record.cleanup_timestamp()))
            .bind(record.cleanup_delay().whole_seconds())
            .bind(i64::from(record.cleanup_attempts))
            .bind(record.client_id.as_deref())
            .bind(*record.id.as_uuid())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "housekeeping record {}",
                    record.id
                )));
            }
            Ok(())
        }

        async fn purge_deleted_older_than(&self, cutoff: OffsetDateTime) -> MetadataResult<u64> {
            let result = sqlx::query(
                "DELETE FROM housekeeping_records WHERE housekeeping_status = ? AND cleanup_timestamp < ?",
            )
            .bind(HousekeepingStatus::Deleted.as_str())
            .bind(db_time(cutoff))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }

        async fn delete_child_partition_records(
            &self,
            database_name: &str,
            table_name: &str,
        ) -> MetadataResult<u64> {
            let result = sqlx::query(&format!(
                r#"
                DELETE FROM housekeeping_records
                WHERE database_name = ?
                  AND table_name = ?
                  AND lifecycle_kind = ?
                  AND partition_name IS NOT NULL
                  AND housekeeping_status IN {PENDING_STATUSES}
                "#
            ))
            .bind(database_name)
            .bind(table_name)
            .bind(LifecycleKind::Expired.as_str())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl HistoryRepo for SqliteStore {
        async fn record_history(&self, event: &HistoryRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO housekeeping_history (
                    id, record_id, event_timestamp, database_name, table_name, partition_name,
                    path, lifecycle_kind, housekeeping_status, cleanup_attempts, client_id
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(event.id)
            .bind(event.record_id)
            .bind(db_time(event.event_timestamp))
            .bind(&event.database_name)
            .bind(&event.table_name)
            .bind(&event.partition_name)
            .bind(&event.path)
            .bind(&event.lifecycle_kind)
            .bind(&event.housekeeping_status)
            .bind(event.cleanup_attempts)
            .bind(&event.client_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn history_for_record(&self, record_id: Uuid) -> MetadataResult<Vec<HistoryRow>> {
            let rows = sqlx::query_as::<_, HistoryRow>(
                r#"
                SELECT * FROM housekeeping_history
                WHERE record_id = ?
                ORDER BY event_timestamp, rowid
                "#,
            )
            .bind(record_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Housekeeping records
CREATE TABLE IF NOT EXISTS housekeeping_records (
    id BLOB PRIMARY KEY,
    path TEXT NOT NULL,
    database_name TEXT NOT NULL,
    table_name TEXT NOT NULL,
    partition_name TEXT,
    housekeeping_status TEXT NOT NULL,
    creation_timestamp TEXT NOT NULL,
    modified_timestamp TEXT NOT NULL,
    cleanup_timestamp TEXT NOT NULL,
    cleanup_delay_secs INTEGER NOT NULL,
    cleanup_attempts INTEGER NOT NULL DEFAULT 0,
    client_id TEXT,
    lifecycle_kind TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_housekeeping_unreferenced_path
    ON housekeeping_records(path) WHERE lifecycle_kind = 'UNREFERENCED';

CREATE INDEX IF NOT EXISTS idx_housekeeping_eligible
    ON housekeeping_records(lifecycle_kind, housekeeping_status, cleanup_timestamp);

CREATE INDEX IF NOT EXISTS idx_housekeeping_table
    ON housekeeping_records(database_name, table_name);

-- Cleanup audit trail
CREATE TABLE IF NOT EXISTS housekeeping_history (
    id BLOB PRIMARY KEY,
    record_id BLOB NOT NULL,
    event_timestamp TEXT NOT NULL,
    database_name TEXT NOT NULL,
    table_name TEXT NOT NULL,
    partition_name TEXT,
    path TEXT NOT NULL,
    lifecycle_kind TEXT NOT NULL,
    housekeeping_status TEXT NOT NULL,
    cleanup_attempts INTEGER NOT NULL,
    client_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_housekeeping_history_record
    ON housekeeping_history(record_id);
"#;
