//! Storage setup and initialization

use anyhow::Result;
use snapsize_core::Config;
use snapsize_storage::{create_storage, StorageHandle};

pub async fn setup_storage(config: &Config) -> Result<StorageHandle> {
    tracing::info!("Initializing storage abstraction...");
    let handle = create_storage(config).await?;
    tracing::info!(
        backend = ?handle.storage.backend_type(),
        signed_transfer_routes = handle.local.is_some(),
        "Storage abstraction initialized successfully"
    );
    Ok(handle)
}
