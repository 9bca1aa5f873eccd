//! Core domain types for lifecycle housekeeping.
//!
//! This crate defines the data model shared by every other crate:
//! - Housekeeping records, their statuses and lifecycle kinds
//! - Audit labels written to the history store
//! - Object-store URIs and Hive partition names
//! - Application configuration

pub mod config;
pub mod error;
pub mod partition;
pub mod path;
pub mod record;

pub use error::{Error, Result};
pub use partition::PartitionSpec;
pub use path::ObjectPath;
pub use record::{
    HistoryStatus, HousekeepingRecord, HousekeepingRecordBuilder, HousekeepingStatus,
    LifecycleKind, RecordId,
};

/// Suffix of the zero-byte marker objects some writers leave in place of directories.
pub const SENTINEL_SUFFIX: &str = "_$folder$";

/// Table property that opts a table into expired-data cleanup.
pub const DEFAULT_EXPIRED_DATA_PROPERTY: &str = "beekeeper.remove.expired.data";
