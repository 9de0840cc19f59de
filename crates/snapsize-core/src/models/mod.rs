//! Data models for the application
//!
//! Plans and quota state, processing options, and the batch lifecycle types shared
//! by every crate in the workspace.

mod batch;
mod options;
mod plan;
mod quota;

pub use batch::*;
pub use options::*;
pub use plan::*;
pub use quota::*;
