//! Retention sweep for settled records.

use crate::error::CleanupResult;
use crate::metrics;
use beekeeper_metadata::MetadataStore;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::info;

/// Purges DELETED records once they are older than the retention window.
pub struct RetentionSweep {
    store: Arc<dyn MetadataStore>,
    max_age: Duration,
}

impl RetentionSweep {
    pub fn new(store: Arc<dyn MetadataStore>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    /// Delete DELETED records whose cleanup timestamp is before `older_than`.
    pub async fn purge(&self, older_than: OffsetDateTime) -> CleanupResult<u64> {
        let purged = self.store.purge_deleted_older_than(older_than).await?;
        metrics::RECORDS_PURGED.inc_by(purged);
        info!(purged, cutoff = %older_than, "Purged deleted housekeeping records");
        Ok(purged)
    }

    /// Purge relative to `now` using the configured maximum age.
    pub async fn run(&self, now: OffsetDateTime) -> CleanupResult<u64> {
        self.purge(now - self.max_age).await
    }
}
