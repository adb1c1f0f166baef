use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveStorage;
use crate::broadcast::ConnectionRegistry;
use crate::config::Config;
use crate::observability::Metrics;
use crate::retention::{self, RetentionService};
use crate::store::FjallLogStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: FjallLogStore,
    pub connections: ConnectionRegistry,
    pub retention: Arc<RetentionService>,
    pub metrics: Arc<Metrics>,
    /// Cancelled when the process begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        store: FjallLogStore,
        storage: Arc<dyn ArchiveStorage>,
        shutdown: CancellationToken,
    ) -> retention::Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let retention = RetentionService::with_metrics(
            config.retention.clone(),
            Arc::new(store.clone()),
            storage,
            metrics.clone(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            store,
            connections: ConnectionRegistry::with_metrics(metrics.clone()),
            retention: Arc::new(retention),
            metrics,
            shutdown,
        })
    }
}
