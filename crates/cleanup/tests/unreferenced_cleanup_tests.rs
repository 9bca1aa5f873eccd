mod common;

use beekeeper_core::{HistoryStatus, HousekeepingStatus};
use common::{BUCKET, TestContext, now, unreferenced};
use time::Duration;

#[tokio::test]
async fn test_directory_cleanup_ignores_prefix_sharing_sibling() {
    let ctx = TestContext::new().await;
    ctx.put("table/partition_1/file1", 10);
    ctx.put("table/partition_1/file2", 20);
    ctx.put("table/partition_1/file3", 30);
    ctx.put("table/partition_1_$folder$", 0);
    ctx.put("table/partition_10/file1", 40);

    let record = unreferenced("table/partition_1", "table");
    ctx.insert(&record).await;

    let report = ctx.service.clean_up(now(), false).await;

    assert_eq!(report.deleted, 1);
    assert_eq!(ctx.keys(), ["table/partition_10/file1"]);
    ctx.assert_settled(&record, HousekeepingStatus::Deleted, 1).await;
    assert_eq!(ctx.history(&record).await, [HistoryStatus::Deleted]);
}

#[tokio::test]
async fn test_large_directory_spans_several_listing_pages() {
    let ctx = TestContext::new().await;
    for i in 0..1100 {
        ctx.put(&format!("table/snapshot/file-{i:05}"), 1);
    }
    ctx.put("table/other", 1);

    let record = unreferenced("table/snapshot", "table");
    ctx.insert(&record).await;

    ctx.service.clean_up(now(), false).await;

    assert_eq!(ctx.keys(), ["table/other"]);
    ctx.assert_settled(&record, HousekeepingStatus::Deleted, 1).await;
}

#[tokio::test]
async fn test_single_file_leaves_siblings() {
    let ctx = TestContext::new().await;
    ctx.put("table/file1", 5);
    ctx.put("table/file2", 5);

    let record = unreferenced("table/file1", "table");
    ctx.insert(&record).await;

    ctx.service.clean_up(now(), false).await;

    assert_eq!(ctx.keys(), ["table/file2"]);
    ctx.assert_settled(&record, HousekeepingStatus::Deleted, 1).await;
}

#[tokio::test]
async fn test_sentinels_cascade_up_to_table_root() {
    let ctx = TestContext::new().await;
    ctx.put("table_$folder$", 0);
    ctx.put("table/id1_$folder$", 0);
    ctx.put("table/id1/partition_1_$folder$", 0);
    ctx.put("table/id1/partition_1/file1", 8);

    let record = unreferenced("table/id1/partition_1", "table");
    ctx.insert(&record).await;

    ctx.service.clean_up(now(), false).await;

    assert_eq!(ctx.keys(), ["table_$folder$"]);
}

#[tokio::test]
async fn test_sentinel_pruning_stops_at_occupied_directory() {
    let ctx = TestContext::new().await;
    ctx.put("table/id1_$folder$", 0);
    ctx.put("table/id1/partition_1/file1", 8);
    ctx.put("table/id1/partition_2/file1", 8);

    let record = unreferenced("table/id1/partition_1", "table");
    ctx.insert(&record).await;

    ctx.service.clean_up(now(), false).await;

    assert_eq!(
        ctx.keys(),
        ["table/id1/partition_2/file1", "table/id1_$folder$"]
    );
}

#[tokio::test]
async fn test_partial_deletion_marks_record_failed() {
    let ctx = TestContext::new().await;
    ctx.put("table/dir/a", 5);
    ctx.put("table/dir/b", 7);
    ctx.put("table/dir_$folder$", 0);
    ctx.backend.reject_delete(BUCKET, "table/dir/b");

    let record = unreferenced("table/dir", "table");
    ctx.insert(&record).await;

    let report = ctx.service.clean_up(now(), false).await;

    assert_eq!(report.failed, 1);
    assert_eq!(ctx.keys(), ["table/dir/b", "table/dir_$folder$"]);
    ctx.assert_settled(&record, HousekeepingStatus::Failed, 1).await;
    assert_eq!(ctx.history(&record).await, [HistoryStatus::Failed]);
}

#[tokio::test]
async fn test_failed_record_is_retried_next_cycle() {
    let ctx = TestContext::new().await;
    ctx.put("table/dir/a", 5);

    let record = unreferenced("table/dir", "table");
    ctx.insert(&record).await;

    ctx.backend.set_unavailable(true);
    ctx.service.clean_up(now(), false).await;
    ctx.assert_settled(&record, HousekeepingStatus::Failed, 1).await;

    ctx.backend.set_unavailable(false);
    let report = ctx
        .service
        .clean_up(now() + Duration::seconds(2), false)
        .await;

    assert_eq!(report.deleted, 1);
    assert!(ctx.keys().is_empty());
    ctx.assert_settled(&record, HousekeepingStatus::Deleted, 2).await;
    assert_eq!(
        ctx.history(&record).await,
        [HistoryStatus::Failed, HistoryStatus::Deleted]
    );
}

#[tokio::test]
async fn test_invalid_path_is_skipped_without_store_calls() {
    let ctx = TestContext::new().await;
    let mut record = unreferenced("ignored", "table");
    record.path = "hdfs://namenode/warehouse/table".to_string();
    ctx.insert(&record).await;

    let report = ctx.service.clean_up(now(), false).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(ctx.backend.list_calls(), 0);
    ctx.assert_settled(&record, HousekeepingStatus::Skipped, 1).await;
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let ctx = TestContext::new().await;
    ctx.put("table/dir/a", 5);
    ctx.put("table/dir_$folder$", 0);
    ctx.put("table/file", 3);

    let dir = unreferenced("table/dir", "table");
    let file = unreferenced("table/file", "table");
    let future = {
        let mut record = unreferenced("table/later", "table");
        record.set_cleanup_delay(Duration::days(30));
        record
    };
    for record in [&dir, &file, &future] {
        ctx.insert(record).await;
    }

    let report = ctx.service.clean_up(now(), true).await;

    assert_eq!(report.records, 2);
    assert_eq!(report.deleted, 2);
    assert_eq!(ctx.keys().len(), 3);
    assert_eq!(ctx.backend.delete_calls(), 0);
    for record in [&dir, &file] {
        ctx.assert_settled(record, HousekeepingStatus::Scheduled, 0).await;
        assert!(ctx.history(record).await.is_empty());
    }
}

#[tokio::test]
async fn test_record_not_yet_due_is_left_alone() {
    let ctx = TestContext::new().await;
    ctx.put("table/file", 3);
    let mut record = unreferenced("table/file", "table");
    record.set_cleanup_delay(Duration::days(30));
    ctx.insert(&record).await;

    let report = ctx.service.clean_up(now(), false).await;

    assert_eq!(report.records, 0);
    assert_eq!(ctx.keys(), ["table/file"]);
    ctx.assert_settled(&record, HousekeepingStatus::Scheduled, 0).await;
}
