//! Periodic cleanup and retention loops.
//!
//! Each loop runs its job to completion before sleeping, so two cycles of
//! the same kind never overlap. Shutdown is only observed while sleeping.

use crate::state::AppState;
use beekeeper_cleanup::CycleReport;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run one cleanup cycle at the current time.
pub async fn run_cleanup_cycle(state: &AppState) -> CycleReport {
    let dry_run = state.config.cleanup.dry_run;
    state
        .cleanup
        .clean_up(OffsetDateTime::now_utc(), dry_run)
        .await
}

/// Run one retention sweep, logging rather than returning failures.
pub async fn run_retention_sweep(state: &AppState) -> Option<u64> {
    match state.retention.run(OffsetDateTime::now_utc()).await {
        Ok(purged) => Some(purged),
        Err(e) => {
            tracing::error!(error = %e, "Retention sweep failed");
            None
        }
    }
}

/// Sleep for `interval`, returning `false` if shutdown was requested first.
async fn wait_for_next_run(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Spawn the cleanup loop. The first cycle starts immediately.
pub fn spawn_cleanup_loop(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let interval = state.config.cleanup.interval();
    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            dry_run = state.config.cleanup.dry_run,
            "Cleanup scheduler started"
        );
        loop {
            run_cleanup_cycle(&state).await;
            if !wait_for_next_run(interval, &mut shutdown).await {
                break;
            }
        }
        tracing::info!("Cleanup scheduler stopped");
    })
}

/// Spawn the retention loop. The first sweep starts immediately.
pub fn spawn_retention_loop(
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = state.config.retention.interval();
    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            max_age_secs = state.config.retention.max_age_secs,
            "Retention scheduler started"
        );
        loop {
            run_retention_sweep(&state).await;
            if !wait_for_next_run(interval, &mut shutdown).await {
                break;
            }
        }
        tracing::info!("Retention scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beekeeper_core::config::AppConfig;
    use beekeeper_core::{HousekeepingRecord, HousekeepingStatus, LifecycleKind};
    use beekeeper_metadata::{HousekeepingRepo, MetadataStore, SqliteStore};
    use beekeeper_storage::{MemoryBackend, ObjectStore};
    use std::sync::Arc;

    async fn build_state() -> (tempfile::TempDir, AppState, Arc<MemoryBackend>) {
        let temp_dir = tempfile::tempdir().unwrap();
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("beekeeper.db"), None)
                .await
                .unwrap(),
        );
        let backend = Arc::new(MemoryBackend::new());
        let storage: Arc<dyn ObjectStore> = backend.clone();
        let state = AppState::new(AppConfig::default(), storage, metadata, None);
        (temp_dir, state, backend)
    }

    fn due_record(key: &str) -> HousekeepingRecord {
        HousekeepingRecord::builder(
            format!("s3://bucket/{key}"),
            "db",
            "table",
            LifecycleKind::Unreferenced,
        )
        .creation_timestamp(OffsetDateTime::now_utc() - time::Duration::days(2))
        .cleanup_delay(time::Duration::days(1))
        .build()
    }

    #[tokio::test]
    async fn test_without_catalog_only_unreferenced_is_active() {
        let (_temp, state, _backend) = build_state().await;
        assert_eq!(state.active_lifecycles(), [LifecycleKind::Unreferenced]);
    }

    #[tokio::test]
    async fn test_run_cleanup_cycle_deletes_due_paths() {
        let (_temp, state, backend) = build_state().await;
        backend.insert("bucket", "table/snapshot/file", 10);
        let record = due_record("table/snapshot");
        state.metadata.create_record(&record).await.unwrap();

        let report = run_cleanup_cycle(&state).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(backend.object_count(), 0);
        let loaded = state.metadata.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, HousekeepingStatus::Deleted);
    }

    #[tokio::test]
    async fn test_cleanup_loop_stops_on_shutdown() {
        let (_temp, state, _backend) = build_state().await;
        let (tx, rx) = watch::channel(false);

        let handle = spawn_cleanup_loop(state, rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("cleanup loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_retention_sweep_reports_purged_count() {
        let (_temp, state, _backend) = build_state().await;
        assert_eq!(run_retention_sweep(&state).await, Some(0));
    }
}
