use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use snapsize_core::models::{AspectRatio, ResizeAlgorithm};

/// Target size for one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeDimensions {
    pub width: u32,
    pub height: u32,
}

pub struct ImageResize;

impl ImageResize {
    /// Center crop to a fixed aspect ratio. `Original` leaves the image untouched.
    pub fn crop_to_aspect(img: DynamicImage, aspect: AspectRatio) -> DynamicImage {
        let Some((ratio_w, ratio_h)) = aspect.ratio() else {
            return img;
        };
        let (width, height) = img.dimensions();
        let (w, h, rw, rh) = (width as u64, height as u64, ratio_w as u64, ratio_h as u64);

        let (crop_w, crop_h) = if w * rh > h * rw {
            // too wide
            (((h * rw) / rh).max(1) as u32, height)
        } else {
            (width, ((w * rh) / rw).max(1) as u32)
        };

        if (crop_w, crop_h) == (width, height) {
            return img;
        }

        let x = (width - crop_w) / 2;
        let y = (height - crop_h) / 2;
        tracing::debug!(
            from_width = width,
            from_height = height,
            crop_width = crop_w,
            crop_height = crop_h,
            "Cropping to aspect ratio"
        );
        img.crop_imm(x, y, crop_w, crop_h)
    }

    /// Fit within `bound` on the longest edge, keeping aspect ratio. Never upscales.
    pub fn fit_within(width: u32, height: u32, bound: u32) -> ResizeDimensions {
        let bound = bound.max(1);
        let longest = width.max(height);
        if longest <= bound {
            return ResizeDimensions { width, height };
        }

        let scale = |edge: u32| -> u32 {
            let scaled = (edge as u64 * bound as u64 + longest as u64 / 2) / longest as u64;
            (scaled as u32).clamp(1, bound)
        };

        if width >= height {
            ResizeDimensions {
                width: bound,
                height: scale(height),
            }
        } else {
            ResizeDimensions {
                width: scale(width),
                height: bound,
            }
        }
    }

    /// Resampling filter for a resize. `Auto` picks from the downscale ratio.
    pub fn filter_for(
        algorithm: ResizeAlgorithm,
        source: (u32, u32),
        target: ResizeDimensions,
    ) -> FilterType {
        match algorithm {
            ResizeAlgorithm::Lanczos3 => FilterType::Lanczos3,
            ResizeAlgorithm::CatmullRom => FilterType::CatmullRom,
            ResizeAlgorithm::Triangle => FilterType::Triangle,
            ResizeAlgorithm::Nearest => FilterType::Nearest,
            ResizeAlgorithm::Auto => {
                let from = source.0.max(source.1) as f64;
                let to = target.width.max(target.height).max(1) as f64;
                let ratio = from / to;
                if ratio > 2.0 {
                    FilterType::Triangle
                } else if ratio > 1.5 {
                    FilterType::CatmullRom
                } else {
                    FilterType::Lanczos3
                }
            }
        }
    }

    /// Resize to fit `bound`, returning the image untouched when it already fits.
    pub fn apply_resize(
        img: &DynamicImage,
        bound: u32,
        algorithm: ResizeAlgorithm,
    ) -> DynamicImage {
        let source = img.dimensions();
        let target = Self::fit_within(source.0, source.1, bound);
        if (target.width, target.height) == source {
            return img.clone();
        }

        let filter = Self::filter_for(algorithm, source, target);
        img.resize_exact(target.width, target.height, filter)
    }
}
