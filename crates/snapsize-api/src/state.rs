//! Application state shared by every handler

use snapsize_core::{Config, QuotaLedger};
use snapsize_services::{
    BatchPipeline, BatchRegistry, StorageLifecycleManager, UploadBroker,
};
use snapsize_storage::{LocalStorage, Storage};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn QuotaLedger>,
    pub storage: Arc<dyn Storage>,
    /// Present when the local backend is active; serves the signed transfer routes.
    pub local_storage: Option<Arc<LocalStorage>>,
    pub broker: Arc<UploadBroker>,
    pub registry: Arc<BatchRegistry>,
    pub pipeline: BatchPipeline,
    pub lifecycle: Arc<StorageLifecycleManager>,
}
