//! Wiring of the cleanup engine from configuration.

use beekeeper_cleanup::{
    CatalogClient, ExpiredMetadataHandler, MetadataCleaner, PagingCleanupService, PathCleaner,
    PathCleanerOptions, RecordHandler, RetentionSweep, UnreferencedPathHandler,
};
use beekeeper_core::LifecycleKind;
use beekeeper_core::config::AppConfig;
use beekeeper_metadata::MetadataStore;
use beekeeper_storage::ObjectStore;
use std::sync::Arc;

/// Everything the scheduler loops share.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metadata: Arc<dyn MetadataStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub cleanup: Arc<PagingCleanupService>,
    pub retention: Arc<RetentionSweep>,
}

impl AppState {
    /// Build the cleanup service for the configured lifecycles.
    ///
    /// Expired-metadata cleanup needs a catalog; without one it is left out
    /// even when configured.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        catalog: Option<Arc<dyn CatalogClient>>,
    ) -> Self {
        let path_cleaner = Arc::new(PathCleaner::new(
            storage.clone(),
            PathCleanerOptions::from(&config.cleanup),
        ));

        let mut handlers: Vec<Arc<dyn RecordHandler>> = Vec::new();
        if config.cleanup.handles(LifecycleKind::Unreferenced) {
            handlers.push(Arc::new(UnreferencedPathHandler::new(
                metadata.clone(),
                path_cleaner.clone(),
            )));
        }
        if config.cleanup.handles(LifecycleKind::Expired) {
            match catalog {
                Some(catalog) => handlers.push(Arc::new(ExpiredMetadataHandler::new(
                    metadata.clone(),
                    MetadataCleaner::new(catalog),
                    path_cleaner,
                    config.cleanup.expired_data_property.clone(),
                ))),
                None => tracing::warn!(
                    "No catalog client configured, expired metadata cleanup is disabled"
                ),
            }
        }

        let cleanup = Arc::new(PagingCleanupService::new(
            metadata.clone(),
            handlers,
            config.cleanup.page_size,
        ));
        let retention = Arc::new(RetentionSweep::new(
            metadata.clone(),
            config.retention.max_age(),
        ));

        Self {
            config,
            metadata,
            storage,
            cleanup,
            retention,
        }
    }

    /// Lifecycles that will actually be cleaned.
    pub fn active_lifecycles(&self) -> Vec<LifecycleKind> {
        self.cleanup.lifecycles()
    }
}
