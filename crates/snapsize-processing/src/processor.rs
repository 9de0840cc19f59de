//! Variant Processor - one source in, one encoded variant per selected size label out

use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use snapsize_core::models::{ProcessingOptions, SizeLabel, VariantResult};
use snapsize_core::{AppError, ProcessingConfig};
use std::io::Cursor;
use std::time::Instant;

use crate::compression::{EncodeSettings, VariantEncoder};
use crate::image::{ColorNormalizer, ImageOrientation, ImageResize};
use crate::metadata::{carry_metadata, inspect_header};

/// Produces the variants of one source file.
///
/// Holds only immutable configuration, so one instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct VariantProcessor {
    config: ProcessingConfig,
}

impl VariantProcessor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Validate, normalize and render every selected variant of `data`.
    ///
    /// Options must already be normalized. Steps run in a fixed order so output is
    /// reproducible for fixed input bytes and options:
    /// 1. header inspection (`InvalidImage` / `UnsupportedFormat`)
    /// 2. bound check against the source limit, before any pixels are decoded
    /// 3. decode, EXIF orientation, color space and alpha normalization, aspect crop
    /// 4. per label: bounded resize, optional unsharp mask, encode, optional metadata carry-over
    #[tracing::instrument(
        skip(self, data, options),
        fields(file_name = %file_name, size_bytes = data.len(), format = %options.format)
    )]
    pub fn process(
        &self,
        file_name: &str,
        data: &[u8],
        options: &ProcessingOptions,
    ) -> Result<Vec<VariantResult>, AppError> {
        let start = Instant::now();

        let metadata = inspect_header(file_name, data)?;
        let max = self.config.max_source_dimension;
        if metadata.width > max || metadata.height > max {
            return Err(AppError::DimensionExceeded {
                file_name: file_name.to_string(),
                width: metadata.width,
                height: metadata.height,
                max,
            });
        }

        let img = decode(file_name, data)?;
        let img =
            ImageOrientation::apply_exif_orientation(img, metadata.exif_orientation.unwrap_or(1));
        let img = ColorNormalizer::normalize(img, options.color_space, options.format);
        let img = ImageResize::crop_to_aspect(img, options.aspect_ratio);

        let settings = EncodeSettings {
            format: options.format,
            quality: options.quality,
            chroma_subsampling: options.chroma_subsampling,
        };

        let variants = options
            .selected_variants
            .labels()
            .iter()
            .map(|&label| self.render_variant(file_name, data, &img, label, options, &settings))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            source_width = metadata.width,
            source_height = metadata.height,
            variant_count = variants.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Variants generated"
        );

        Ok(variants)
    }

    fn render_variant(
        &self,
        file_name: &str,
        source: &[u8],
        img: &DynamicImage,
        label: SizeLabel,
        options: &ProcessingOptions,
        settings: &EncodeSettings,
    ) -> Result<VariantResult, AppError> {
        let bound = self
            .config
            .size_bounds
            .bound(label)
            .min(options.max_dimension());

        let mut resized = ImageResize::apply_resize(img, bound, options.resize_algorithm);
        if let Some((sigma, threshold)) = options.sharpening.unsharpen_params() {
            resized = resized.unsharpen(sigma, threshold);
        }
        let (width, height) = resized.dimensions();

        let encoded =
            VariantEncoder::encode(&resized, settings).map_err(|e| AppError::InternalWithSource {
                message: format!("Encoding {} variant of {} failed", label, file_name),
                source: e,
            })?;

        let bytes = if options.strip_metadata {
            encoded
        } else {
            carry_metadata(source, encoded, options.format)
        };

        tracing::debug!(
            size_label = %label,
            width = width,
            height = height,
            size_bytes = bytes.len(),
            "Variant encoded"
        );

        Ok(VariantResult {
            size_label: label,
            bytes,
            width,
            height,
        })
    }
}

fn decode(file_name: &str, data: &[u8]) -> Result<DynamicImage, AppError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::InvalidImage {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        })?;

    reader.decode().map_err(|e| match e {
        ImageError::Unsupported(detail) => AppError::UnsupportedFormat {
            file_name: file_name.to_string(),
            detail: detail.to_string(),
        },
        other => AppError::InvalidImage {
            file_name: file_name.to_string(),
            reason: other.to_string(),
        },
    })
}
