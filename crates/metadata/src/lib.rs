//! Housekeeping records, their audit trail, and the SQLite store that
//! keeps both.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{HistoryRow, HousekeepingRow};
pub use repos::{HistoryRepo, HousekeepingRepo, Page, PageRequest};
pub use store::{MetadataStore, SqliteStore};

use beekeeper_core::config::MetadataConfig;
use std::sync::Arc;

pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;

    let MetadataConfig::Sqlite {
        path,
        query_timeout_secs,
    } = config;
    let store = SqliteStore::new(path, *query_timeout_secs).await?;
    Ok(Arc::new(store))
}
