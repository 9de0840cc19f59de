//! Service wiring

use chrono::Utc;
use snapsize_core::{Config, QuotaLedger};
use snapsize_services::{
    BatchPipeline, BatchRegistry, StorageLifecycleManager, UploadBroker, VariantProcessor,
};
use snapsize_storage::StorageHandle;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

const REGISTRY_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Build the application state from its collaborators.
pub fn initialize_services(
    config: &Config,
    ledger: Arc<dyn QuotaLedger>,
    storage: StorageHandle,
) -> Arc<AppState> {
    let processing = config.processing();
    let StorageHandle {
        storage,
        local: local_storage,
    } = storage;

    let processor = Arc::new(VariantProcessor::new(processing));
    let lifecycle = Arc::new(StorageLifecycleManager::new(
        storage.clone(),
        config.download_url_ttl(),
        processing.worker_limit,
    ));
    let pipeline = BatchPipeline::new(storage.clone(), processor, lifecycle.clone());
    let broker = Arc::new(UploadBroker::new(
        storage.clone(),
        config.upload_url_ttl(),
        config.batch_ttl(),
    ));

    tracing::info!(
        worker_limit = processing.worker_limit,
        max_source_dimension = processing.max_source_dimension,
        ledger_backend = ledger.backend_name(),
        "Services initialized"
    );

    Arc::new(AppState {
        config: config.clone(),
        ledger,
        storage,
        local_storage,
        broker,
        registry: Arc::new(BatchRegistry::new()),
        pipeline,
        lifecycle,
    })
}

/// Drop expired batches periodically so abandoned ones do not pile up between
/// registrations.
pub fn spawn_registry_sweeper(registry: Arc<BatchRegistry>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REGISTRY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let swept = registry.sweep_expired(Utc::now()).await;
            if swept > 0 {
                tracing::debug!(swept, "Expired batches swept");
            }
        }
    });
}
