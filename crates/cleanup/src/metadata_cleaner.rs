//! Catalog-facing cleanup operations.

use crate::catalog::{CatalogClient, CatalogResult};
use crate::metrics;
use beekeeper_core::PartitionSpec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Drops tables and partitions, honouring dry runs and counting what it drops.
pub struct MetadataCleaner {
    catalog: Arc<dyn CatalogClient>,
}

impl MetadataCleaner {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }

    pub async fn table_exists(&self, database: &str, table: &str) -> CatalogResult<bool> {
        match self.catalog.table_exists(database, table).await {
            Err(e) if e.is_not_found() => Ok(false),
            result => result,
        }
    }

    /// Table parameters, empty for a table the catalog does not know.
    pub async fn table_properties(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<HashMap<String, String>> {
        match self.catalog.get_table_properties(database, table).await {
            Err(e) if e.is_not_found() => {
                debug!(database, table, "Table not found, treating it as having no properties");
                Ok(HashMap::new())
            }
            result => result,
        }
    }

    pub async fn drop_table(&self, database: &str, table: &str, dry_run: bool) -> CatalogResult<()> {
        if dry_run {
            info!(database, table, "Dry run: would drop table");
        } else {
            match self.catalog.drop_table(database, table).await {
                Ok(()) => info!(database, table, "Dropped table"),
                Err(e) if e.is_not_found() => info!(database, table, "Table already dropped"),
                Err(e) => return Err(e),
            }
        }
        metrics::record_table_dropped(dry_run);
        Ok(())
    }

    /// Drop a partition. Returns whether it was registered; a dry run always
    /// reports `true`.
    pub async fn drop_partition(
        &self,
        database: &str,
        table: &str,
        partition: &PartitionSpec,
        dry_run: bool,
    ) -> CatalogResult<bool> {
        if dry_run {
            info!(database, table, partition = %partition, "Dry run: would drop partition");
            metrics::record_partition_dropped(true);
            return Ok(true);
        }

        let dropped = match self.catalog.drop_partition(database, table, partition).await {
            Err(e) if e.is_not_found() => false,
            result => result?,
        };
        if dropped {
            info!(database, table, partition = %partition, "Dropped partition");
            metrics::record_partition_dropped(false);
        } else {
            info!(database, table, partition = %partition, "Partition was not registered");
        }
        Ok(dropped)
    }
}
