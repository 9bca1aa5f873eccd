//! Table catalog abstraction.
//!
//! The cleanup engine only needs four catalog operations. Implementations
//! wrap whatever metastore client a deployment uses; [`MemoryCatalog`] backs
//! tests and local runs.

pub mod memory;

pub use memory::MemoryCatalog;

use async_trait::async_trait;
use beekeeper_core::PartitionSpec;
use std::collections::HashMap;
use thiserror::Error;

/// Catalog operation errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The table is managed by a table format whose data layout the engine
    /// must not touch (Iceberg and similar).
    #[error("{database}.{table} is a managed {format} table")]
    ManagedFormat {
        database: String,
        table: String,
        format: String,
    },

    #[error("table {database}.{table} not found")]
    TableNotFound { database: String, table: String },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog client error: {0}")]
    Client(String),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TableNotFound { .. })
    }

    pub fn is_managed_format(&self) -> bool {
        matches!(self, Self::ManagedFormat { .. })
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Catalog client used by the metadata cleanup path.
///
/// Any call may fail with [`CatalogError::ManagedFormat`] when the table
/// belongs to a managed table format. Calls on a table that does not exist
/// may fail with [`CatalogError::TableNotFound`], which [`MetadataCleaner`]
/// treats as an absent table with no parameters.
///
/// [`MetadataCleaner`]: crate::MetadataCleaner
#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    /// Whether the table is registered. `Ok(false)` and `TableNotFound` mean the same.
    async fn table_exists(&self, database: &str, table: &str) -> CatalogResult<bool>;

    /// Table parameters.
    async fn get_table_properties(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<HashMap<String, String>>;

    /// Drop a table's metadata. Data files are removed separately.
    async fn drop_table(&self, database: &str, table: &str) -> CatalogResult<()>;

    /// Drop one partition's metadata.
    ///
    /// Returns `false` when the partition was not registered.
    async fn drop_partition(
        &self,
        database: &str,
        table: &str,
        partition: &PartitionSpec,
    ) -> CatalogResult<bool>;
}
