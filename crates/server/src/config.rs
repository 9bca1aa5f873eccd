//! Configuration loading.

use anyhow::{Context, Result};
use beekeeper_core::config::AppConfig;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;

/// Prefix of environment variables that override configuration.
pub const ENV_PREFIX: &str = "BEEKEEPER_";

/// Load configuration from an optional TOML file merged with environment
/// variables (`BEEKEEPER_CLEANUP__DRY_RUN=true` sets `cleanup.dry_run`).
///
/// Every section has defaults, so a missing file is not an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let mut figment = Figment::new();

    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path.display(),
            "No config file found, using defaults and environment variables"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beekeeper_core::LifecycleKind;
    use beekeeper_core::config::{MetadataConfig, StorageConfig};
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.cleanup.page_size, 500);
        assert!(config.retention.enabled);
    }

    #[test]
    fn test_file_sections_are_loaded() {
        let file = write_config(
            r#"
            [storage]
            type = "s3"
            endpoint = "http://localhost:9000"
            force_path_style = true

            [metadata]
            type = "sqlite"
            path = "/var/lib/beekeeper/beekeeper.db"

            [cleanup]
            dry_run = true
            page_size = 50
            lifecycles = ["UNREFERENCED"]

            [retention]
            max_age_secs = 3600
            "#,
        );

        let config = load_config(file.path()).unwrap();

        assert!(config.cleanup.dry_run);
        assert_eq!(config.cleanup.page_size, 50);
        assert!(!config.cleanup.handles(LifecycleKind::Expired));
        assert_eq!(config.retention.max_age_secs, 3600);
        let StorageConfig::S3 {
            endpoint,
            force_path_style,
            ..
        } = &config.storage;
        assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(*force_path_style);
        let MetadataConfig::Sqlite { path, .. } = &config.metadata;
        assert_eq!(path.to_str(), Some("/var/lib/beekeeper/beekeeper.db"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config(
            r#"
            [cleanup]
            delete_batch_size = 5000
            "#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("delete_batch_size"));
    }
}
