use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use snapsize_core::models::{ColorSpace, OutputFormat};

/// Color space and alpha normalization applied once per source before resizing
pub struct ColorNormalizer;

impl ColorNormalizer {
    /// Convert to the target color space and pixel layout the encoder expects.
    ///
    /// Opaque formats get RGB8 with alpha flattened onto white. Alpha-capable formats get
    /// RGBA8. Grayscale goes through luma and back to the encoder's layout.
    pub fn normalize(
        img: DynamicImage,
        color_space: ColorSpace,
        format: OutputFormat,
    ) -> DynamicImage {
        let img = match color_space {
            ColorSpace::Srgb => img,
            ColorSpace::Grayscale => {
                if img.color().has_alpha() {
                    DynamicImage::ImageLumaA8(img.to_luma_alpha8())
                } else {
                    DynamicImage::ImageLuma8(img.to_luma8())
                }
            }
        };

        if format.supports_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else if img.color().has_alpha() {
            DynamicImage::ImageRgb8(Self::flatten_onto_white(&img.to_rgba8()))
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        }
    }

    /// Alpha-composite every pixel over an opaque white background
    pub fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
        let (width, height) = rgba.dimensions();
        RgbImage::from_fn(width, height, |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as u32;
            let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            Rgb([blend(r), blend(g), blend(b)])
        })
    }
}
