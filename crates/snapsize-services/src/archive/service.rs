use anyhow::{Context, Result};
use snapsize_core::models::{
    ArchiveFormat, ArchiveManifest, ManifestEntry, ProcessedSource, ProcessingOptions,
    SourceMetric,
};
use snapsize_core::AppError;
use snapsize_processing::base_name;
use std::io::{Cursor, Write};

use super::naming::{entry_path, EntryNamer};

/// Packs every variant of a batch into one archive.
pub struct ArchiveAssembler;

impl ArchiveAssembler {
    /// Build the archive bytes and manifest.
    ///
    /// CPU-bound; run it on the blocking pool.
    pub fn assemble(
        sources: &[ProcessedSource],
        options: &ProcessingOptions,
    ) -> Result<(Vec<u8>, ArchiveManifest), AppError> {
        let ext = options.format.extension();
        let mut namer = EntryNamer::new();
        let mut entries: Vec<(String, &[u8])> = Vec::new();
        let mut metrics = Vec::with_capacity(sources.len());

        for source in sources {
            let base = base_name(&source.original_name);
            for variant in &source.variants {
                let path = namer.claim(entry_path(
                    &base,
                    variant.size_label,
                    ext,
                    &options.naming,
                    options.folder_organization,
                ));
                entries.push((path, variant.bytes.as_slice()));
            }
            metrics.push(SourceMetric {
                original_name: source.original_name.clone(),
                largest_variant_bytes: source.largest_variant_bytes(),
            });
        }

        if entries.is_empty() {
            return Err(AppError::ArchiveFailure(
                "No variants to archive".to_string(),
            ));
        }

        let archive = match options.archive_format {
            ArchiveFormat::Zip => write_zip(&entries),
            ArchiveFormat::Tar => write_tar(&entries),
        }
        .map_err(|e| AppError::ArchiveFailure(format!("{:#}", e)))?;

        let manifest = ArchiveManifest {
            entries: entries
                .iter()
                .map(|(path, data)| ManifestEntry {
                    path: path.clone(),
                    size_bytes: data.len() as u64,
                })
                .collect(),
            bytes_represented: metrics.iter().map(|m| m.largest_variant_bytes).sum(),
            sources: metrics,
        };

        tracing::debug!(
            archive_format = ?options.archive_format,
            entry_count = manifest.entry_count(),
            archive_bytes = archive.len(),
            bytes_represented = manifest.bytes_represented,
            "Archive assembled"
        );

        Ok((archive, manifest))
    }
}

fn write_zip(entries: &[(String, &[u8])]) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        for (path, data) in entries {
            zip.start_file(path.as_str(), options)
                .with_context(|| format!("Failed to add file to ZIP: {}", path))?;
            zip.write_all(data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", path))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    Ok(buffer)
}

fn write_tar(entries: &[(String, &[u8])]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut tar = tar::Builder::new(&mut buffer);

        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();

            tar.append_data(&mut header, path, *data)
                .with_context(|| format!("Failed to add file to TAR: {}", path))?;
        }

        tar.finish().context("Failed to finalize TAR archive")?;
    }

    Ok(buffer)
}
