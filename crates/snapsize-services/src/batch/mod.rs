mod registry;

pub use registry::{BatchLease, BatchRegistry, CancelOutcome};
