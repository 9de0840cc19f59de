//! Images synthesized in-process

use std::io::{Cursor, Read};

/// PNG with a simple gradient so encoders have real content to work on.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    buffer.into_inner()
}

/// Sorted entry names of a ZIP archive.
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid ZIP archive");
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

/// Bytes of one ZIP entry.
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid ZIP archive");
    let mut entry = archive.by_name(name).expect("entry present");
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}
