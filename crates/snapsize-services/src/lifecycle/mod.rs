mod service;

pub use service::{FinishedArchive, StorageLifecycleManager};
