//! Settings for storage, the record store and the two scheduled jobs.

use crate::record::LifecycleKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Largest batch accepted by S3 `DeleteObjects`.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// S3-compatible storage. Buckets come from each record's path.
    S3 {
        /// Custom endpoint such as `minio:9000`. Unset means AWS.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        region: Option<String>,
        /// Static key pair. Both or neither; neither uses the ambient
        /// AWS credential chain. Better supplied through the environment.
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::S3 {
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        let Self::S3 {
            access_key_id,
            secret_access_key,
            ..
        } = self;
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(
                "storage.access_key_id and storage.secret_access_key must be set together"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Where housekeeping records and history live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    Sqlite {
        path: PathBuf,
        /// Seconds a write waits on a locked database.
        #[serde(default = "default_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/beekeeper.db"),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("metadata.path cannot be empty".to_string())
            }
            MetadataConfig::Sqlite { .. } => Ok(()),
        }
    }
}

/// Cleanup cycle configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Run cleanup cycles on a schedule (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between the end of one cycle and the start of the next (default: 5 minutes).
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Report what would be deleted without deleting or persisting anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Records requested per repository page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Keys requested per object listing call.
    #[serde(default = "default_listing_page_size")]
    pub listing_page_size: usize,
    /// Keys per batch delete call (at most 1000).
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
    /// Table property that must be `true` before an expired table is dropped.
    #[serde(default = "default_expired_data_property")]
    pub expired_data_property: String,
    /// Lifecycle kinds processed by this instance (default: all).
    #[serde(default = "default_lifecycles")]
    pub lifecycles: Vec<LifecycleKind>,
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_page_size() -> u32 {
    500
}

fn default_listing_page_size() -> usize {
    1000
}

fn default_delete_batch_size() -> usize {
    MAX_DELETE_BATCH_SIZE
}

fn default_expired_data_property() -> String {
    crate::DEFAULT_EXPIRED_DATA_PROPERTY.to_string()
}

fn default_lifecycles() -> Vec<LifecycleKind> {
    vec![LifecycleKind::Unreferenced, LifecycleKind::Expired]
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval_secs(),
            dry_run: false,
            page_size: default_page_size(),
            listing_page_size: default_listing_page_size(),
            delete_batch_size: default_delete_batch_size(),
            expired_data_property: default_expired_data_property(),
            lifecycles: default_lifecycles(),
        }
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub fn handles(&self, lifecycle: LifecycleKind) -> bool {
        self.lifecycles.contains(&lifecycle)
    }

    /// Validate cleanup configuration for settings that would break a cycle.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("cleanup.interval_secs cannot be 0".to_string());
        }
        if self.page_size == 0 {
            return Err("cleanup.page_size cannot be 0".to_string());
        }
        if self.listing_page_size == 0 {
            return Err("cleanup.listing_page_size cannot be 0".to_string());
        }
        if self.delete_batch_size == 0 || self.delete_batch_size > MAX_DELETE_BATCH_SIZE {
            return Err(format!(
                "cleanup.delete_batch_size {} must be between 1 and {}",
                self.delete_batch_size, MAX_DELETE_BATCH_SIZE
            ));
        }
        if self.expired_data_property.trim().is_empty() {
            return Err("cleanup.expired_data_property cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Retention sweep configuration for DELETED records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Purge old DELETED records on a schedule (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps (default: 1 day).
    #[serde(default = "default_retention_interval_secs")]
    pub interval_secs: u64,
    /// DELETED records whose cleanup timestamp is older than this are purged (default: 7 days).
    #[serde(default = "default_retention_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_retention_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_retention_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_retention_interval_secs(),
            max_age_secs: default_retention_max_age_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        let secs = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("retention.interval_secs cannot be 0".to_string());
        }
        if self.max_age_secs > i64::MAX as u64 {
            return Err(format!(
                "retention.max_age_secs {} exceeds maximum value {}",
                self.max_age_secs,
                i64::MAX
            ));
        }
        Ok(())
    }
}

/// Top-level settings. Every section may be omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl AppConfig {
    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.metadata.validate()?;
        self.cleanup.validate()?;
        self.retention.validate()
    }
}
