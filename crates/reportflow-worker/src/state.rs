use std::sync::Arc;

use reportflow_core::{ClientFactory, Config, Credentials, Extractor, SnapshotStore};

use crate::analytics_data::AnalyticsDataFactory;
use crate::sync::SyncService;

/// Shared worker state handed to the scheduler loop and CLI commands.
/// Storage is reached through `sync` only.
pub struct WorkerState {
    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
    pub extractor: Arc<Extractor>,
    pub sync: SyncService,
}

impl WorkerState {
    /// Wire the given store and client factory. Tests pass fakes for both.
    pub fn with_factory(
        config: Config,
        store: Arc<dyn SnapshotStore>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        let extractor = Arc::new(Extractor::new(config.extract.clone(), factory));
        let default_credentials = config.default_access_token.clone().map(Credentials::new);
        let sync = SyncService::new(store, Arc::clone(&extractor), default_credentials);
        Self {
            config: Arc::new(config),
            extractor,
            sync,
        }
    }

    /// Production wiring: the HTTP reporting client.
    pub fn new(config: Config, store: Arc<dyn SnapshotStore>) -> Self {
        let factory = Arc::new(AnalyticsDataFactory::new(
            &config.api_base_url,
            config.extract.request_timeout,
        ));
        Self::with_factory(config, store, factory)
    }
}
