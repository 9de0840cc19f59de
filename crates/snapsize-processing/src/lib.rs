//! Snapsize Processing Library
//!
//! The Variant Processor: validates an uploaded source image, normalizes it and produces
//! one re-encoded variant per selected size label.
//!
//! Everything here is synchronous and CPU-bound. Callers run it on the blocking pool.

pub mod validator;

#[cfg(feature = "image")]
pub mod compression;
#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "image")]
pub mod metadata;
#[cfg(feature = "image")]
pub mod processor;

#[cfg(feature = "image")]
pub use compression::{EncodeSettings, VariantEncoder};
#[cfg(feature = "image")]
pub use metadata::{carry_metadata, inspect_header, ImageMetadata};
#[cfg(feature = "image")]
pub use processor::VariantProcessor;
pub use validator::{base_name, sanitize_file_name, MediaValidator, ValidationError};
