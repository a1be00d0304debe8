//! Progress events emitted by the ingestion pipeline.
//!
//! The orchestrator never logs progress directly. It emits [`IngestEvent`]s
//! to a [`ProgressReporter`], which keeps the pipeline independent of how
//! progress is displayed (log lines, a status endpoint, nothing at all).

use crate::error::AppError;
use crate::ingest::IngestionResult;

/// Something worth reporting happened during ingestion.
#[derive(Debug, Clone, Copy)]
pub enum IngestEvent<'a> {
    /// A full run acquired the run guard.
    Started,
    /// The catalogue was fetched.
    Fetched {
        /// Records delivered by the source.
        total: usize,
    },
    /// A batch was written to the store.
    BatchFlushed {
        /// Records handled so far, including skipped ones.
        processed: usize,
        /// Records delivered by the source.
        total: usize,
        /// Rows written by this batch.
        written: u64,
    },
    /// One record was skipped.
    RecordSkipped {
        external_id: i64,
        error: &'a AppError,
    },
    /// A whole batch failed to persist; its records are retried one at a time.
    BatchFailed {
        external_ids: &'a [i64],
        error: &'a AppError,
    },
    /// The store index could not be rebuilt. The run still succeeds.
    IndexRebuildFailed { error: &'a AppError },
    /// The run finished.
    Completed { result: &'a IngestionResult },
    /// The run failed before processing any record.
    Failed { error: &'a AppError },
    /// Every stored product was deleted.
    Cleared { removed: u64 },
}

/// Receives ingestion progress events.
pub trait ProgressReporter: Send + Sync {
    /// Handles one event. Must not block.
    fn report(&self, event: IngestEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: IngestEvent<'_>) {}
}

/// Writes every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: IngestEvent<'_>) {
        match event {
            IngestEvent::Started => tracing::info!("Starting data load"),
            IngestEvent::Fetched { total } => {
                tracing::info!(total, "Fetched products from source")
            }
            IngestEvent::BatchFlushed {
                processed,
                total,
                written,
            } => tracing::info!(processed, total, written, "Batch persisted"),
            IngestEvent::RecordSkipped { external_id, error } => {
                tracing::warn!(external_id, error = %error, "Skipping product")
            }
            IngestEvent::BatchFailed {
                external_ids,
                error,
            } => tracing::warn!(
                records = external_ids.len(),
                first_external_id = external_ids.first().copied(),
                error = %error,
                "Batch upsert failed, writing its records one by one"
            ),
            IngestEvent::IndexRebuildFailed { error } => {
                tracing::warn!(error = %error, "Search index rebuild failed")
            }
            IngestEvent::Completed { result } => tracing::info!(
                total = result.total,
                new = result.new_count,
                updated = result.updated_count,
                skipped = result.skipped_ids.len(),
                "{}",
                result.message
            ),
            IngestEvent::Failed { error } => tracing::error!(error = %error, "Data load failed"),
            IngestEvent::Cleared { removed } => tracing::info!(removed, "Cleared all products"),
        }
    }
}
