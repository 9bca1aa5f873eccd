//! The paging cleanup cycle.

use crate::handler::{Disposition, RecordHandler};
use crate::metrics;
use beekeeper_core::{HousekeepingStatus, LifecycleKind, RecordId};
use beekeeper_metadata::{MetadataStore, PageRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Counts from one cleanup cycle.
///
/// A record read again on a re-requested page counts once in `records` and
/// once in `deferred`. A table deferred and then settled later in the same
/// cycle counts in both `deferred` and its settled status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Distinct records handed to a handler.
    pub records: u64,
    pub deleted: u64,
    pub failed: u64,
    pub skipped: u64,
    pub deferred: u64,
    /// Records whose outcome could not be persisted, plus failed page fetches.
    pub errors: u64,
}

impl CycleReport {
    fn count(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Settled(HousekeepingStatus::Deleted) => self.deleted += 1,
            Disposition::Settled(HousekeepingStatus::Failed) => self.failed += 1,
            Disposition::Settled(HousekeepingStatus::Skipped) => self.skipped += 1,
            Disposition::Settled(_) => {}
            Disposition::Deferred => self.deferred += 1,
        }
    }
}

/// Pages through eligible records and hands each to the handler registered
/// for its lifecycle kind.
///
/// Handlers run one after another, and records within a page are handled
/// sequentially.
pub struct PagingCleanupService {
    store: Arc<dyn MetadataStore>,
    handlers: Vec<Arc<dyn RecordHandler>>,
    page_size: u32,
}

impl PagingCleanupService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        handlers: Vec<Arc<dyn RecordHandler>>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            handlers,
            page_size: page_size.max(1),
        }
    }

    /// Lifecycle kinds with a registered handler, in processing order.
    pub fn lifecycles(&self) -> Vec<LifecycleKind> {
        self.handlers.iter().map(|h| h.lifecycle()).collect()
    }

    /// Run one cleanup cycle over every registered lifecycle.
    ///
    /// A real run re-reads the same page index after handling it, because
    /// settled records leave the eligible set. A dry run persists nothing,
    /// so it advances instead. A real-run page that settled nothing also
    /// advances; otherwise a page of deferred records would be read forever.
    pub async fn clean_up(&self, now: OffsetDateTime, dry_run: bool) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for handler in &self.handlers {
            self.run_handler(handler.as_ref(), now, dry_run, &mut report)
                .await;
        }

        metrics::CYCLE_DURATION.observe(started.elapsed().as_secs_f64());
        info!(
            records = report.records,
            deleted = report.deleted,
            failed = report.failed,
            skipped = report.skipped,
            deferred = report.deferred,
            errors = report.errors,
            dry_run,
            "Cleanup cycle finished"
        );
        report
    }

    async fn run_handler(
        &self,
        handler: &dyn RecordHandler,
        now: OffsetDateTime,
        dry_run: bool,
        report: &mut CycleReport,
    ) {
        let lifecycle = handler.lifecycle();
        let mut request = PageRequest::first(self.page_size);
        // Deferred records stay eligible and are read again on re-requested pages.
        let mut seen: HashSet<RecordId> = HashSet::new();
        let mut deferred: HashSet<RecordId> = HashSet::new();

        loop {
            let page = match self.store.page_eligible(lifecycle, now, request).await {
                Ok(page) => page,
                Err(e) => {
                    error!(lifecycle = %lifecycle, page = request.index, error = %e, "Failed to fetch eligible records");
                    report.errors += 1;
                    return;
                }
            };
            debug!(lifecycle = %lifecycle, page = request.index, records = page.len(), "Fetched eligible records");

            let is_last = page.is_last();
            let mut settled = 0usize;

            for record in page.items {
                let record_id = record.id;
                if seen.insert(record_id) {
                    report.records += 1;
                }

                match handler.handle(record, now, dry_run).await {
                    Ok(Disposition::Deferred) => {
                        if deferred.insert(record_id) {
                            metrics::RECORDS_DEFERRED
                                .with_label_values(&[lifecycle.as_str()])
                                .inc();
                            report.count(Disposition::Deferred);
                        }
                    }
                    Ok(disposition) => {
                        settled += 1;
                        report.count(disposition);
                    }
                    Err(e) => {
                        warn!(record_id = %record_id, lifecycle = %lifecycle, error = %e, "Failed to handle record");
                        metrics::HANDLER_ERRORS
                            .with_label_values(&[lifecycle.as_str()])
                            .inc();
                        report.errors += 1;
                    }
                }
            }

            if is_last {
                return;
            }
            if dry_run || settled == 0 {
                request = request.next();
            }
        }
    }
}
