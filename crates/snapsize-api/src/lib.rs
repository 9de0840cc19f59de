//! Snapsize API Library
//!
//! HTTP handlers, error rendering, state wiring and application setup.

mod api_doc;
pub mod constants;
pub mod error;
pub mod extractors;
mod handlers;
pub mod setup;
pub mod state;

pub use error::{HttpAppError, ValidatedJson};
pub use snapsize_infra::ErrorResponse;
