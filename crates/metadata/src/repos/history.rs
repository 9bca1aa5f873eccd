//! Cleanup history repository.

use crate::error::MetadataResult;
use crate::models::HistoryRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for the cleanup audit trail.
#[async_trait]
pub trait HistoryRepo: Send + Sync {
    /// Append an audit event.
    async fn record_history(&self, event: &HistoryRow) -> MetadataResult<()>;

    /// Events recorded for a record, oldest first.
    async fn history_for_record(&self, record_id: Uuid) -> MetadataResult<Vec<HistoryRow>>;
}
