use anyhow::Result;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, GenericImageView};
use snapsize_core::models::{ChromaSubsampling, OutputFormat, QualitySettings};

/// Per-variant encoder settings, taken from normalized processing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    pub quality: QualitySettings,
    pub chroma_subsampling: ChromaSubsampling,
}

/// Encodes one variant. Every encoder here is deterministic for fixed pixels and settings.
pub struct VariantEncoder;

impl VariantEncoder {
    pub fn encode(img: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>> {
        let quality = &settings.quality;
        match settings.format {
            OutputFormat::Jpeg => {
                Self::encode_jpeg(img, quality.jpeg_quality, settings.chroma_subsampling)
            }
            OutputFormat::Png => Self::encode_png(img, quality.png_compression),
            OutputFormat::Webp => Self::encode_webp(img, quality.webp_quality),
            OutputFormat::Avif => Self::encode_avif(img, quality.avif_quality),
        }
    }

    /// Compress to JPEG using mozjpeg
    fn encode_jpeg(
        img: &DynamicImage,
        quality: u32,
        chroma: ChromaSubsampling,
    ) -> Result<Vec<u8>> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let (cb, cr) = match chroma {
            ChromaSubsampling::Yuv420 => ((2, 2), (2, 2)),
            ChromaSubsampling::Yuv422 => ((2, 1), (2, 1)),
            ChromaSubsampling::Yuv444 => ((1, 1), (1, 1)),
        };
        comp.set_chroma_sampling_pixel_sizes(cb, cr);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(rgb_img.as_raw())?;
        let jpeg_data = comp.finish()?;

        Ok(jpeg_data)
    }

    /// Lossless PNG. Levels 0-9 collapse onto the three zlib presets the encoder exposes.
    fn encode_png(img: &DynamicImage, level: u32) -> Result<Vec<u8>> {
        let compression = match level {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        };

        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, compression, PngFilterType::Adaptive);
        img.write_with_encoder(encoder)?;

        Ok(buffer)
    }

    fn encode_webp(img: &DynamicImage, quality: u32) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(webp_data.to_vec())
    }

    fn encode_avif(img: &DynamicImage, quality: u32) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let rgba_data: Vec<rgb::RGBA8> = rgba_img
            .as_raw()
            .chunks_exact(4)
            .map(|px| rgb::RGBA8::new(px[0], px[1], px[2], px[3]))
            .collect();

        let img_buf = ravif::Img::new(rgba_data.as_slice(), width as usize, height as usize);

        let encoder = ravif::Encoder::new()
            .with_quality(quality as f32)
            .with_speed(6);

        let avif_data = encoder.encode_rgba(img_buf)?;

        Ok(avif_data.avif_file)
    }
}
