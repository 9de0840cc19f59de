//! Source probing and metadata carry-over

use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use img_parts::{DynImage, ImageEXIF, ImageICC};
use serde::Serialize;
use snapsize_core::models::OutputFormat;
use snapsize_core::AppError;
use std::io::Cursor;

use crate::image::ImageOrientation;

/// EXIF tag id for orientation
const ORIENTATION_TAG: u16 = 0x0112;

/// Source formats the processor decodes
const SUPPORTED_SOURCE_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// Header-level facts about a source image, read without decoding pixels
#[derive(Debug, Clone, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub size_bytes: u64,
    pub exif_orientation: Option<u8>,
}

/// Read format and dimensions from the header.
pub fn inspect_header(file_name: &str, data: &[u8]) -> Result<ImageMetadata, AppError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::InvalidImage {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        })?;

    let format = match reader.format() {
        Some(format) if SUPPORTED_SOURCE_FORMATS.contains(&format) => format,
        Some(other) => {
            return Err(AppError::UnsupportedFormat {
                file_name: file_name.to_string(),
                detail: format!("{:?} sources are not supported", other),
            })
        }
        None => {
            return Err(AppError::InvalidImage {
                file_name: file_name.to_string(),
                reason: "unrecognized image data".to_string(),
            })
        }
    };

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| AppError::InvalidImage {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        })?;

    let orientation = ImageOrientation::read_exif_orientation(data);

    Ok(ImageMetadata {
        width,
        height,
        format: format!("{:?}", format),
        size_bytes: data.len() as u64,
        exif_orientation: (orientation != 1).then_some(orientation),
    })
}

/// Copy the source's EXIF (orientation reset to 1) and ICC profile into an encoded variant.
///
/// AVIF output is always stripped. Any failure returns the variant unchanged.
pub fn carry_metadata(source: &[u8], encoded: Vec<u8>, format: OutputFormat) -> Vec<u8> {
    if format == OutputFormat::Avif {
        return encoded;
    }

    let source_image = match DynImage::from_bytes(Bytes::copy_from_slice(source)) {
        Ok(Some(image)) => image,
        Ok(None) => return encoded,
        Err(e) => {
            tracing::debug!(error = %e, "Source container unreadable, stripping metadata");
            return encoded;
        }
    };

    let exif = source_image.exif().map(reset_orientation);
    let icc = source_image.icc_profile();
    if exif.is_none() && icc.is_none() {
        return encoded;
    }

    let mut variant = match DynImage::from_bytes(Bytes::from(encoded.clone())) {
        Ok(Some(image)) => image,
        Ok(None) => return encoded,
        Err(e) => {
            tracing::debug!(
                error = %e,
                %format,
                "Variant container unreadable, stripping metadata"
            );
            return encoded;
        }
    };

    variant.set_exif(exif);
    variant.set_icc_profile(icc);
    variant.encoder().bytes().to_vec()
}

fn reset_orientation(exif: Bytes) -> Bytes {
    let mut buf = exif.to_vec();
    let start = if buf.starts_with(b"Exif\0\0") { 6 } else { 0 };
    if patch_orientation(&mut buf[start..]).is_none() {
        tracing::debug!("No orientation tag in EXIF IFD0");
    }
    Bytes::from(buf)
}

/// Rewrite the IFD0 orientation entry of a TIFF block to 1 (normal).
fn patch_orientation(tiff: &mut [u8]) -> Option<()> {
    let big_endian = match tiff.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let read_u16 = |buf: &[u8], at: usize| -> Option<u16> {
        let b = buf.get(at..at + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |buf: &[u8], at: usize| -> Option<u32> {
        let b = buf.get(at..at + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    let ifd = read_u32(tiff, 4)? as usize;
    let count = read_u16(tiff, ifd)? as usize;
    for i in 0..count {
        let entry = ifd + 2 + i * 12;
        if read_u16(tiff, entry)? == ORIENTATION_TAG {
            let normal = if big_endian {
                1u16.to_be_bytes()
            } else {
                1u16.to_le_bytes()
            };
            tiff.get_mut(entry + 8..entry + 10)?.copy_from_slice(&normal);
            return Some(());
        }
    }
    None
}
