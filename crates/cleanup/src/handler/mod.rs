//! Per-record cleanup decisions.

mod expired;
mod unreferenced;

pub use expired::ExpiredMetadataHandler;
pub use unreferenced::UnreferencedPathHandler;

use crate::error::CleanupResult;
use crate::metrics;
use async_trait::async_trait;
use beekeeper_core::{HistoryStatus, HousekeepingRecord, HousekeepingStatus, LifecycleKind};
use beekeeper_metadata::{HistoryRow, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

/// What a handler did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The record reached a decision (persisted unless in a dry run).
    Settled(HousekeepingStatus),
    /// The record was left untouched for a later cycle.
    Deferred,
}

/// Cleans up one lifecycle kind of housekeeping record.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// The lifecycle kind this handler is registered for.
    fn lifecycle(&self) -> LifecycleKind;

    /// Clean up a single record and persist the outcome.
    ///
    /// Cleanup failures become a FAILED or SKIPPED outcome; an error is only
    /// returned when the outcome itself could not be persisted.
    async fn handle(
        &self,
        record: HousekeepingRecord,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition>;
}

/// Persists record outcomes and their audit trail.
pub(crate) struct RecordSettler {
    store: Arc<dyn MetadataStore>,
}

impl RecordSettler {
    pub(crate) fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Settle with the history label matching `status`.
    pub(crate) async fn settle(
        &self,
        record: HousekeepingRecord,
        status: HousekeepingStatus,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        self.settle_with(record, status, Some(status.into()), now, dry_run)
            .await
    }

    /// Bump the attempt count, set `status`, save, and record `history` if given.
    ///
    /// A dry run only logs the outcome. A history write failure is logged and
    /// does not undo the saved outcome.
    pub(crate) async fn settle_with(
        &self,
        mut record: HousekeepingRecord,
        status: HousekeepingStatus,
        history: Option<HistoryStatus>,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> CleanupResult<Disposition> {
        if dry_run {
            info!(
                record_id = %record.id,
                path = %record.path,
                status = %status,
                "Dry run: record would be settled"
            );
            return Ok(Disposition::Settled(status));
        }

        record.status = status;
        record.cleanup_attempts = record.cleanup_attempts.saturating_add(1);
        // Never earlier than the cycle's `now`, so the record drops out of this cycle's scan.
        record.modified_timestamp = now.max(OffsetDateTime::now_utc());
        self.store.save(&record).await?;

        metrics::RECORDS_SETTLED
            .with_label_values(&[record.lifecycle().as_str(), status.as_str()])
            .inc();

        if let Some(label) = history {
            let event = HistoryRow::for_record(&record, label, record.modified_timestamp);
            if let Err(e) = self.store.record_history(&event).await {
                warn!(record_id = %record.id, error = %e, "Failed to record cleanup history");
            }
        }

        info!(
            record_id = %record.id,
            path = %record.path,
            status = %status,
            attempts = record.cleanup_attempts,
            "Settled housekeeping record"
        );
        Ok(Disposition::Settled(status))
    }
}
