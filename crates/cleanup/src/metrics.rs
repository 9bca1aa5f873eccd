//! Prometheus metrics for the cleanup engine.
//!
//! Every destructive counter has a dry-run twin so that a dry run never
//! inflates the figures of real deletions.

use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help).expect("valid counter definition")
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition")
}

// Object store
pub static BYTES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_s3_bytes_deleted_total",
        "Bytes removed from the object store",
    )
});
pub static DRY_RUN_BYTES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_dry_run_s3_bytes_deleted_total",
        "Bytes a dry run would have removed from the object store",
    )
});
pub static OBJECTS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_s3_objects_deleted_total",
        "Objects removed from the object store",
    )
});
pub static DRY_RUN_OBJECTS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_dry_run_s3_objects_deleted_total",
        "Objects a dry run would have removed from the object store",
    )
});

// Catalog
pub static TABLES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_hive_tables_deleted_total",
        "Tables dropped from the catalog",
    )
});
pub static DRY_RUN_TABLES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_dry_run_hive_tables_deleted_total",
        "Tables a dry run would have dropped from the catalog",
    )
});
pub static PARTITIONS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_hive_partitions_deleted_total",
        "Partitions dropped from the catalog",
    )
});
pub static DRY_RUN_PARTITIONS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_dry_run_hive_partitions_deleted_total",
        "Partitions a dry run would have dropped from the catalog",
    )
});

// Records
pub static RECORDS_SETTLED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_vec(
        "beekeeper_records_settled_total",
        "Housekeeping records persisted with a cleanup outcome",
        &["lifecycle", "status"],
    )
});
pub static RECORDS_DEFERRED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_vec(
        "beekeeper_records_deferred_total",
        "Housekeeping records left untouched until a later cycle",
        &["lifecycle"],
    )
});
pub static HANDLER_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_vec(
        "beekeeper_handler_errors_total",
        "Records whose handling failed before an outcome was persisted",
        &["lifecycle"],
    )
});
pub static RECORDS_PURGED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "beekeeper_records_purged_total",
        "DELETED records removed by the retention sweep",
    )
});

pub static CYCLE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        "beekeeper_cleanup_cycle_duration_seconds",
        "Wall time of one cleanup cycle across all lifecycles",
    )
    .buckets(vec![
        0.1, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0,
    ]);
    Histogram::with_opts(opts).expect("valid histogram definition")
});

/// Count objects removed, or in a dry run the objects that would have been.
pub fn record_objects_deleted(objects: u64, bytes: u64, dry_run: bool) {
    let (count, size) = if dry_run {
        (&*DRY_RUN_OBJECTS_DELETED, &*DRY_RUN_BYTES_DELETED)
    } else {
        (&*OBJECTS_DELETED, &*BYTES_DELETED)
    };
    count.inc_by(objects);
    size.inc_by(bytes);
}

pub fn record_table_dropped(dry_run: bool) {
    if dry_run {
        DRY_RUN_TABLES_DELETED.inc();
    } else {
        TABLES_DELETED.inc();
    }
}

pub fn record_partition_dropped(dry_run: bool) {
    if dry_run {
        DRY_RUN_PARTITIONS_DELETED.inc();
    } else {
        PARTITIONS_DELETED.inc();
    }
}

static REGISTER_ONCE: Once = Once::new();

/// Add every metric to [`REGISTRY`]. Later calls do nothing.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(BYTES_DELETED.clone()),
            Box::new(DRY_RUN_BYTES_DELETED.clone()),
            Box::new(OBJECTS_DELETED.clone()),
            Box::new(DRY_RUN_OBJECTS_DELETED.clone()),
            Box::new(TABLES_DELETED.clone()),
            Box::new(DRY_RUN_TABLES_DELETED.clone()),
            Box::new(PARTITIONS_DELETED.clone()),
            Box::new(DRY_RUN_PARTITIONS_DELETED.clone()),
            Box::new(RECORDS_SETTLED.clone()),
            Box::new(RECORDS_DEFERRED.clone()),
            Box::new(HANDLER_ERRORS.clone()),
            Box::new(RECORDS_PURGED.clone()),
            Box::new(CYCLE_DURATION.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric names are unique");
        }
    });
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let mut out = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut out)?;
    String::from_utf8(out).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
