//! Pixel operations on decoded sources
//!
//! - Orientation correction from EXIF (orientation)
//! - Color space and alpha normalization (normalize)
//! - Aspect crop, bounded resize and filter choice (resize)

pub mod normalize;
pub mod orientation;
pub mod resize;

pub use normalize::ColorNormalizer;
pub use orientation::ImageOrientation;
pub use resize::{ImageResize, ResizeDimensions};
