//! In-memory catalog.

use super::{CatalogClient, CatalogError, CatalogResult};
use async_trait::async_trait;
use beekeeper_core::PartitionSpec;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default, Clone)]
struct Table {
    properties: HashMap<String, String>,
    partitions: BTreeSet<String>,
    managed_format: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<(String, String), Table>,
    unavailable: bool,
    fail_drops: bool,
}

/// Catalog held in process memory, with failure injection for tests.
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
    table_exists_calls: AtomicUsize,
    drop_table_calls: AtomicUsize,
    drop_partition_calls: AtomicUsize,
}

impl std::fmt::Debug for MemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCatalog")
            .field("tables", &self.state().tables.len())
            .finish()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.state().unavailable {
            return Err(CatalogError::Unavailable("memory catalog offline".to_string()));
        }
        Ok(())
    }

    /// Register a table with the given parameters.
    pub fn add_table<K, V>(
        &self,
        database: &str,
        table: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.state().tables.insert(
            (database.to_string(), table.to_string()),
            Table {
                properties,
                ..Table::default()
            },
        );
    }

    /// Register a table that refuses every call except `table_exists`.
    pub fn add_managed_table(&self, database: &str, table: &str, format: &str) {
        self.state().tables.insert(
            (database.to_string(), table.to_string()),
            Table {
                managed_format: Some(format.to_string()),
                ..Table::default()
            },
        );
    }

    /// Register a partition on an existing table.
    pub fn add_partition(&self, database: &str, table: &str, partition_name: &str) {
        if let Some(entry) = self
            .state()
            .tables
            .get_mut(&(database.to_string(), table.to_string()))
        {
            entry.partitions.insert(partition_name.to_string());
        }
    }

    pub fn has_table(&self, database: &str, table: &str) -> bool {
        self.state()
            .tables
            .contains_key(&(database.to_string(), table.to_string()))
    }

    pub fn has_partition(&self, database: &str, table: &str, partition_name: &str) -> bool {
        self.state()
            .tables
            .get(&(database.to_string(), table.to_string()))
            .is_some_and(|t| t.partitions.contains(partition_name))
    }

    /// Make every call fail as if the metastore were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Make drop calls fail while reads keep working.
    pub fn fail_drops(&self, fail: bool) {
        self.state().fail_drops = fail;
    }

    pub fn table_exists_calls(&self) -> usize {
        self.table_exists_calls.load(Ordering::SeqCst)
    }

    pub fn drop_table_calls(&self) -> usize {
        self.drop_table_calls.load(Ordering::SeqCst)
    }

    pub fn drop_partition_calls(&self) -> usize {
        self.drop_partition_calls.load(Ordering::SeqCst)
    }
}

fn not_found(database: &str, table: &str) -> CatalogError {
    CatalogError::TableNotFound {
        database: database.to_string(),
        table: table.to_string(),
    }
}

impl Table {
    fn check_plain(&self, database: &str, table: &str) -> CatalogResult<()> {
        match &self.managed_format {
            Some(format) => Err(CatalogError::ManagedFormat {
                database: database.to_string(),
                table: table.to_string(),
                format: format.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn table_exists(&self, database: &str, table: &str) -> CatalogResult<bool> {
        self.check_available()?;
        self.table_exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.has_table(database, table))
    }

    async fn get_table_properties(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<HashMap<String, String>> {
        self.check_available()?;
        let state = self.state();
        let Some(entry) = state
            .tables
            .get(&(database.to_string(), table.to_string()))
        else {
            return Err(not_found(database, table));
        };

        entry.check_plain(database, table)?;
        Ok(entry.properties.clone())
    }

    async fn drop_table(&self, database: &str, table: &str) -> CatalogResult<()> {
        self.check_available()?;
        self.drop_table_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if state.fail_drops {
            return Err(CatalogError::Client(format!(
                "drop of {database}.{table} rejected"
            )));
        }
        let key = (database.to_string(), table.to_string());
        let entry = state
            .tables
            .get(&key)
            .ok_or_else(|| not_found(database, table))?;
        entry.check_plain(database, table)?;
        state.tables.remove(&key);
        Ok(())
    }

    async fn drop_partition(
        &self,
        database: &str,
        table: &str,
        partition: &PartitionSpec,
    ) -> CatalogResult<bool> {
        self.check_available()?;
        self.drop_partition_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if state.fail_drops {
            return Err(CatalogError::Client(format!(
                "drop of {database}.{table}/{partition} rejected"
            )));
        }
        let Some(entry) = state
            .tables
            .get_mut(&(database.to_string(), table.to_string()))
        else {
            return Ok(false);
        };
        entry.check_plain(database, table)?;
        Ok(entry.partitions.remove(&partition.to_string()))
    }
}
