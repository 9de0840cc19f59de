//! Bounded batch pipeline: fetch, variant generation, archive, lifecycle

use futures::stream::{self, StreamExt, TryStreamExt};
use snapsize_core::models::{
    BatchOutcome, LimitKind, ProcessFile, ProcessedSource, ProcessingOptions, UploadSlot,
};
use snapsize_core::AppError;
use snapsize_processing::VariantProcessor;
use snapsize_storage::{Storage, StorageError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::archive::ArchiveAssembler;
use crate::batch::BatchLease;
use crate::lifecycle::{FinishedArchive, StorageLifecycleManager};

/// Runs one admitted batch end to end.
///
/// Fetch and variant generation for different files run concurrently, bounded by
/// `worker_limit`; every fetched source and variant buffer stays in memory until the
/// archive is built, so the limit is also the memory bound. The first failing file
/// aborts the batch and no archive is written.
#[derive(Clone)]
pub struct BatchPipeline {
    storage: Arc<dyn Storage>,
    processor: Arc<VariantProcessor>,
    lifecycle: Arc<StorageLifecycleManager>,
    worker_limit: usize,
}

impl BatchPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        processor: Arc<VariantProcessor>,
        lifecycle: Arc<StorageLifecycleManager>,
    ) -> Self {
        let worker_limit = processor.config().worker_limit.max(1);
        Self {
            storage,
            processor,
            lifecycle,
            worker_limit,
        }
    }

    pub fn lifecycle(&self) -> &StorageLifecycleManager {
        &self.lifecycle
    }

    /// Process `files` of a leased batch with already normalized and gated options.
    ///
    /// `max_file_size_bytes` is the caller's plan limit, checked against the bytes
    /// actually uploaded.
    #[tracing::instrument(
        skip(self, lease, files, options),
        fields(batch_id = %lease.batch.batch_id, file_count = files.len())
    )]
    pub async fn run(
        &self,
        lease: &BatchLease,
        files: &[ProcessFile],
        options: &ProcessingOptions,
        max_file_size_bytes: u64,
    ) -> Result<BatchOutcome, AppError> {
        let start = Instant::now();
        let jobs: Vec<(usize, UploadSlot)> = resolve_slots(lease, files)?
            .into_iter()
            .cloned()
            .enumerate()
            .collect();

        let job = SourceJob {
            storage: self.storage.clone(),
            processor: self.processor.clone(),
            options: Arc::new(options.clone()),
            cancelled: lease.cancel_flag(),
            max_file_size_bytes,
        };
        let mut processed: Vec<(usize, ProcessedSource)> = stream::iter(jobs)
            .map(|(index, slot)| {
                let job = job.clone();
                async move { job.process(slot).await.map(|source| (index, source)) }
            })
            .buffer_unordered(self.worker_limit)
            .try_collect()
            .await?;

        // Completion order is arbitrary; naming collisions resolve in request order.
        processed.sort_by_key(|(index, _)| *index);
        let sources: Vec<ProcessedSource> =
            processed.into_iter().map(|(_, source)| source).collect();
        let files_processed = sources.len();

        ensure_not_cancelled(&lease.cancel_flag())?;

        let assemble_options = options.clone();
        let (bytes, manifest) = tokio::task::spawn_blocking(move || {
            ArchiveAssembler::assemble(&sources, &assemble_options)
        })
        .await
        .map_err(|e| AppError::ArchiveFailure(format!("Archive worker failed: {}", e)))??;

        ensure_not_cancelled(&lease.cancel_flag())?;

        let temp_keys: Vec<String> = lease.batch.keys().map(String::from).collect();
        let outcome = self
            .lifecycle
            .finalize(
                FinishedArchive {
                    batch_id: &lease.batch.batch_id,
                    bytes,
                    format: options.archive_format,
                    manifest,
                    files_processed,
                },
                &temp_keys,
            )
            .await?;

        tracing::info!(
            files_processed,
            entry_count = outcome.manifest.entry_count(),
            bytes_represented = outcome.manifest.bytes_represented,
            cleanup_failures = outcome.cleanup_failures,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch processed"
        );

        Ok(outcome)
    }
}

/// Everything one source needs, owned so the per-file futures are `Send + 'static`.
#[derive(Clone)]
struct SourceJob {
    storage: Arc<dyn Storage>,
    processor: Arc<VariantProcessor>,
    options: Arc<ProcessingOptions>,
    cancelled: Arc<AtomicBool>,
    max_file_size_bytes: u64,
}

impl SourceJob {
    async fn process(self, slot: UploadSlot) -> Result<ProcessedSource, AppError> {
        ensure_not_cancelled(&self.cancelled)?;

        let data = self.storage.get(&slot.key).await.map_err(|e| match e {
            StorageError::NotFound(_) => {
                AppError::InvalidInput(format!("{} was not uploaded", slot.original_file_name))
            }
            other => AppError::from(other),
        })?;

        let size_bytes = data.len() as u64;
        if size_bytes > self.max_file_size_bytes {
            tracing::warn!(
                file_name = %slot.original_file_name,
                size_bytes,
                limit_bytes = self.max_file_size_bytes,
                "Uploaded file exceeds the plan's file size limit"
            );
            return Err(AppError::AdmissionDenied {
                kind: LimitKind::FileSize,
                remaining: None,
            });
        }
        if size_bytes > slot.declared_size {
            return Err(AppError::InvalidInput(format!(
                "{} is {} bytes, larger than the declared {}",
                slot.original_file_name, size_bytes, slot.declared_size
            )));
        }

        let processor = self.processor.clone();
        let file_name = slot.original_file_name.clone();
        let options = self.options.clone();
        let variants = tokio::task::spawn_blocking(move || {
            processor.process(&file_name, &data, &options)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Variant worker failed: {}", e)))?
        .inspect_err(|e| {
            tracing::warn!(
                file_name = %slot.original_file_name,
                error = %e,
                "Source file rejected, aborting batch"
            )
        })?;

        Ok(ProcessedSource {
            original_name: slot.original_file_name,
            variants,
        })
    }
}

/// Map requested keys onto the batch's slots, in request order.
fn resolve_slots<'a>(
    lease: &'a BatchLease,
    files: &[ProcessFile],
) -> Result<Vec<&'a UploadSlot>, AppError> {
    if files.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one file is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    files
        .iter()
        .map(|file| {
            if !seen.insert(file.key.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "Key {} is listed more than once",
                    file.key
                )));
            }
            lease.batch.slot(&file.key).ok_or_else(|| {
                AppError::InvalidInput(format!("Key {} does not belong to this batch", file.key))
            })
        })
        .collect()
}

fn ensure_not_cancelled(cancelled: &AtomicBool) -> Result<(), AppError> {
    if cancelled.load(Ordering::Acquire) {
        return Err(AppError::BadRequest("Batch was cancelled".to_string()));
    }
    Ok(())
}
