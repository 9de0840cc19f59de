//! Snapsize Services Layer
//!
//! Orchestration for one batch: issuing upload slots, tracking registered batches,
//! running the bounded variant pipeline, assembling the archive and managing the
//! storage lifecycle of temporary and finished objects. The API crate depends on this
//! facade and keeps its handlers thin.

pub mod archive;
pub mod batch;
pub mod ledger;
pub mod lifecycle;
pub mod pipeline;
pub mod upload;

#[cfg(test)]
mod testing;

pub use archive::{entry_path, ArchiveAssembler, EntryNamer};
pub use batch::{BatchLease, BatchRegistry, CancelOutcome};
pub use ledger::InMemoryQuotaLedger;
pub use lifecycle::{FinishedArchive, StorageLifecycleManager};
pub use pipeline::BatchPipeline;
pub use upload::UploadBroker;

pub use snapsize_processing::{MediaValidator, VariantProcessor};
pub use snapsize_storage::{create_storage, Storage, StorageBackend, StorageError, StorageHandle};
