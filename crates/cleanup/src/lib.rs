//! The Beekeeper cleanup engine.
//!
//! This crate turns due housekeeping records into deletions:
//! - [`PagingCleanupService`] pages through eligible records and dispatches them
//! - [`RecordHandler`] implementations decide each record's outcome
//! - [`PathCleaner`] removes objects and directory trees from the object store
//! - [`MetadataCleaner`] drops tables and partitions through a [`CatalogClient`]
//! - [`RetentionSweep`] purges old DELETED records

pub mod bytes;
pub mod catalog;
pub mod error;
pub mod handler;
pub mod metadata_cleaner;
pub mod metrics;
pub mod path_cleaner;
pub mod retention;
pub mod sentinel;
pub mod service;

pub use bytes::BytesAccountant;
pub use catalog::{CatalogClient, CatalogError, CatalogResult, MemoryCatalog};
pub use error::{CleanupError, CleanupResult};
pub use handler::{Disposition, ExpiredMetadataHandler, RecordHandler, UnreferencedPathHandler};
pub use metadata_cleaner::MetadataCleaner;
pub use path_cleaner::{CleanupSummary, PathCleaner, PathCleanerOptions};
pub use retention::RetentionSweep;
pub use sentinel::SentinelPruner;
pub use service::{CycleReport, PagingCleanupService};
