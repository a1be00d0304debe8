//! Ingestion service: keeps the local store in line with the remote catalogue.
//!
//! # Architecture
//!
//! [`IngestionService`] is generic over two traits:
//! - [`ProductStore`] - local persistence
//! - [`ProductSource`] - the remote catalogue, resilience included
//!
//! # Full ingestion
//!
//! At most one full run executes at a time. The run guard is an atomic
//! [`RunState`] taken with a compare-and-swap, so a concurrent
//! [`IngestionService::start_full_ingestion`] call is rejected immediately
//! instead of waiting. An accepted run is spawned onto the tokio runtime and
//! the caller receives an [`IngestionHandle`] to await the result.
//!
//! The pipeline fetches the whole catalogue, then for each record in source
//! order: maps it, decides new-vs-update against the store, and appends it to
//! a batch. Full batches (and the final partial one) are written with a single
//! `batch_upsert`. A record that cannot be mapped or looked up is skipped. A
//! batch that cannot be written is retried one record at a time and only the
//! records that still fail are skipped. Neither stops the run. Counters only
//! include persisted records.
//!
//! Taking the guard resets the run status, and releasing it publishes the
//! final status, each under the status lock: `status().running` and the
//! guard never disagree.
//!
//! After the last batch the store index is rebuilt. A failed rebuild is
//! reported as a warning on an otherwise successful result.
//!
//! # Concurrency with single-product operations
//!
//! [`IngestionService::ingest_one`] and [`IngestionService::clear_all`] do not
//! take the run guard and may interleave with a running full ingestion. A clear
//! issued mid-run can therefore be followed by further batch writes from that
//! run.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::AppError;
use crate::mapper;
use crate::models::{
    PageRequest, PagedProducts, Product, ProductFilter, ProductResponse, RemoteProduct,
};
use crate::progress::{IngestEvent, ProgressReporter, TracingReporter};
use crate::status::{RunState, RunStatus, StatusTracker};
use crate::traits::{ProductSource, ProductStore};

/// Suffix appended to the result message when the index rebuild fails.
pub const INDEX_WARNING: &str = " (Warning: Search index rebuild failed)";

// =============================================================================
// Results
// =============================================================================

/// Outcome of one ingestion operation. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub success: bool,
    pub message: String,
    /// `new_count + updated_count` for ingestion, rows removed for a clear.
    pub total: u64,
    pub new_count: u64,
    pub updated_count: u64,
    /// External ids skipped during a full run, in source order.
    pub skipped_ids: Vec<i64>,
    /// True when the store index rebuild failed after a successful run.
    pub index_warning: bool,
}

impl IngestionResult {
    /// A failed operation with zero counters.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            total: 0,
            new_count: 0,
            updated_count: 0,
            skipped_ids: Vec::new(),
            index_warning: false,
        }
    }
}

/// Whether a record was inserted or overwrote an existing product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this external id is seen.
    Created,
    /// An existing product was overwritten.
    Updated,
}

/// Counters accumulated over one full run.
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub created: u64,
    pub updated: u64,
    pub skipped_ids: Vec<i64>,
}

impl IngestStats {
    /// Records a persisted record.
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    /// Records a skipped record.
    pub fn skip(&mut self, external_id: i64) {
        self.skipped_ids.push(external_id);
    }

    /// Number of persisted records.
    pub fn total(&self) -> u64 {
        self.created + self.updated
    }
}

/// Products waiting for the next `batch_upsert`, with their outcome.
#[derive(Default)]
struct PendingBatch {
    products: Vec<Product>,
    outcomes: Vec<UpsertOutcome>,
}

impl PendingBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            products: Vec::with_capacity(capacity),
            outcomes: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, product: Product, outcome: UpsertOutcome) {
        self.products.push(product);
        self.outcomes.push(outcome);
    }

    fn len(&self) -> usize {
        self.products.len()
    }

    fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// =============================================================================
// Run guard and handle
// =============================================================================

/// Holds the run guard for the lifetime of a spawned run.
///
/// If the task ends without calling [`RunGuard::finish`] (a panic), the guard
/// is released as `Failed` on drop so later runs are not locked out.
struct RunGuard {
    state: Arc<AtomicU8>,
    status: StatusTracker,
    finished: bool,
}

impl RunGuard {
    /// Publishes the terminal status and releases the guard.
    fn finish(mut self, event: IngestEvent<'_>) {
        self.status.conclude(&self.state, event);
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!("Ingestion task ended without a result, releasing run guard");
            self.status.mark_aborted(&self.state);
        }
    }
}

enum HandleInner {
    Ready(Option<IngestionResult>),
    Spawned(JoinHandle<IngestionResult>),
}

/// Future resolving to the result of a full ingestion request.
///
/// Dropping the handle does not stop an accepted run.
pub struct IngestionHandle {
    inner: HandleInner,
}

impl IngestionHandle {
    fn ready(result: IngestionResult) -> Self {
        Self {
            inner: HandleInner::Ready(Some(result)),
        }
    }

    fn spawned(handle: JoinHandle<IngestionResult>) -> Self {
        Self {
            inner: HandleInner::Spawned(handle),
        }
    }

    /// True if the request was rejected because a run was already in progress.
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner, HandleInner::Ready(_))
    }
}

impl Future for IngestionHandle {
    type Output = IngestionResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            HandleInner::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| IngestionResult::failure("Ingestion result already taken")),
            ),
            HandleInner::Spawned(handle) => match Pin::new(handle).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(e)) => Poll::Ready(IngestionResult::failure(format!(
                    "Data loading failed: {}",
                    e
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Orchestrates ingestion from a [`ProductSource`] into a [`ProductStore`].
///
/// Cloning is cheap and every clone shares the same run guard and status.
///
/// # Example
///
/// ```ignore
/// use prodsync_core::IngestionService;
///
/// let service = IngestionService::new(repository, client);
/// let result = service.start_full_ingestion().await;
/// println!("{}", result.message);
/// ```
pub struct IngestionService<S, C>
where
    S: ProductStore,
    C: ProductSource,
{
    store: S,
    source: C,
    config: IngestConfig,
    run_state: Arc<AtomicU8>,
    status: StatusTracker,
}

impl<S, C> Clone for IngestionService<S, C>
where
    S: ProductStore + Clone,
    C: ProductSource + Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            source: self.source.clone(),
            config: self.config.clone(),
            run_state: Arc::clone(&self.run_state),
            status: self.status.clone(),
        }
    }
}

impl<S, C> IngestionService<S, C>
where
    S: ProductStore,
    C: ProductSource,
{
    /// Creates a new ingestion service with default configuration.
    pub fn new(store: S, source: C) -> Self {
        Self::with_config(store, source, IngestConfig::default())
    }

    /// Creates an ingestion service with custom configuration.
    pub fn with_config(store: S, source: C, config: IngestConfig) -> Self {
        Self {
            store,
            source,
            config,
            run_state: Arc::new(AtomicU8::new(RunState::Idle.as_u8())),
            status: StatusTracker::new(),
        }
    }

    /// Returns the current run status. Never waits on the pipeline.
    pub fn status(&self) -> RunStatus {
        self.status.snapshot()
    }

    /// Returns the state of the run guard.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    fn emit<R: ProgressReporter>(&self, reporter: &R, event: IngestEvent<'_>) {
        self.status.report(event);
        reporter.report(event);
    }

    /// Maps one record and decides whether it is new or an update.
    async fn prepare(&self, remote: &RemoteProduct) -> Result<(Product, UpsertOutcome), AppError> {
        let external_id = remote.id;
        let as_record_error = |e: AppError| match e {
            e @ AppError::RecordProcessing { .. } => e,
            other => AppError::RecordProcessing {
                external_id,
                reason: other.to_string(),
            },
        };

        let fresh = mapper::to_entity(remote)?;
        if !self
            .store
            .exists_by_external_id(external_id)
            .await
            .map_err(as_record_error)?
        {
            return Ok((fresh, UpsertOutcome::Created));
        }

        match self
            .store
            .find_by_external_id(external_id)
            .await
            .map_err(as_record_error)?
        {
            Some(existing) => Ok((mapper::merge_into(existing, remote)?, UpsertOutcome::Updated)),
            // Removed between the two lookups, e.g. by a concurrent clear
            None => Ok((fresh, UpsertOutcome::Created)),
        }
    }

    /// Writes the pending batch. Returns the number of rows written.
    ///
    /// If the batch write fails, each record is written on its own so one
    /// bad row only costs itself.
    async fn flush<R: ProgressReporter>(
        &self,
        batch: &mut PendingBatch,
        stats: &mut IngestStats,
        reporter: &R,
    ) -> u64 {
        if batch.is_empty() {
            return 0;
        }
        let pending = std::mem::take(batch);

        let error = match self.store.batch_upsert(&pending.products).await {
            Ok(written) => {
                for outcome in pending.outcomes {
                    stats.record(outcome);
                }
                return written;
            }
            Err(e) => e,
        };

        let ids: Vec<i64> = pending.products.iter().map(|p| p.external_id).collect();
        self.emit(
            reporter,
            IngestEvent::BatchFailed {
                external_ids: &ids,
                error: &error,
            },
        );

        let mut written = 0;
        for (product, outcome) in pending.products.iter().zip(pending.outcomes) {
            match self.store.batch_upsert(std::slice::from_ref(product)).await {
                Ok(rows) => {
                    stats.record(outcome);
                    written += rows;
                }
                Err(e) => {
                    stats.skip(product.external_id);
                    self.emit(
                        reporter,
                        IngestEvent::RecordSkipped {
                            external_id: product.external_id,
                            error: &e,
                        },
                    );
                }
            }
        }
        written
    }

    async fn run_full_ingestion<R: ProgressReporter>(
        &self,
        reporter: &R,
        guard: RunGuard,
    ) -> IngestionResult {
        let page = match self.source.fetch_all().await {
            Ok(page) => page,
            Err(e) => {
                let event = IngestEvent::Failed { error: &e };
                guard.finish(event);
                reporter.report(event);
                return IngestionResult::failure(format!("Data loading failed: {}", e));
            }
        };

        let total = page.products.len();
        if page.total != total as u64 {
            tracing::debug!(
                reported = page.total,
                received = total,
                "Source total differs from records received"
            );
        }
        self.emit(reporter, IngestEvent::Fetched { total });

        let batch_size = self.config.batch_size.max(1);
        let mut batch = PendingBatch::with_capacity(batch_size);
        let mut stats = IngestStats::default();
        let mut seen = HashSet::with_capacity(total);

        for (index, remote) in page.products.iter().enumerate() {
            let prepared = if seen.insert(remote.id) {
                self.prepare(remote).await
            } else {
                Err(AppError::RecordProcessing {
                    external_id: remote.id,
                    reason: "duplicate external id in source payload".to_string(),
                })
            };

            match prepared {
                Ok((product, outcome)) => batch.push(product, outcome),
                Err(e) => {
                    stats.skip(remote.id);
                    self.emit(
                        reporter,
                        IngestEvent::RecordSkipped {
                            external_id: remote.id,
                            error: &e,
                        },
                    );
                }
            }

            let processed = index + 1;
            if batch.len() >= batch_size || processed == total {
                let written = self.flush(&mut batch, &mut stats, reporter).await;
                self.emit(
                    reporter,
                    IngestEvent::BatchFlushed {
                        processed,
                        total,
                        written,
                    },
                );
            }
        }

        let index_warning = match self.store.rebuild_index().await {
            Ok(()) => false,
            Err(e) => {
                self.emit(reporter, IngestEvent::IndexRebuildFailed { error: &e });
                true
            }
        };

        let mut message = format!(
            "Successfully processed {} products ({} new, {} updated)",
            stats.total(),
            stats.created,
            stats.updated
        );
        if index_warning {
            message.push_str(INDEX_WARNING);
        }

        let result = IngestionResult {
            success: true,
            message,
            total: stats.total(),
            new_count: stats.created,
            updated_count: stats.updated,
            skipped_ids: stats.skipped_ids,
            index_warning,
        };
        let event = IngestEvent::Completed { result: &result };
        guard.finish(event);
        reporter.report(event);
        result
    }

    /// Ingests a single product, bypassing the run guard.
    ///
    /// Failures are reported in the result, never raised.
    pub async fn ingest_one(&self, external_id: i64) -> IngestionResult {
        match self.try_ingest_one(external_id).await {
            Ok(outcome) => {
                let (verb, new_count, updated_count) = match outcome {
                    UpsertOutcome::Created => ("created", 1, 0),
                    UpsertOutcome::Updated => ("updated", 0, 1),
                };
                tracing::info!(external_id, "Successfully {} product", verb);
                IngestionResult {
                    success: true,
                    message: format!("Product {} successfully", verb),
                    total: 1,
                    new_count,
                    updated_count,
                    skipped_ids: Vec::new(),
                    index_warning: false,
                }
            }
            Err(e) => {
                tracing::error!(external_id, error = %e, "Failed to load product");
                IngestionResult::failure(format!("Failed to load product: {}", e))
            }
        }
    }

    async fn try_ingest_one(&self, external_id: i64) -> Result<UpsertOutcome, AppError> {
        let remote = self.source.fetch_one(external_id).await?;
        let (product, outcome) = self.prepare(&remote).await?;
        self.store
            .batch_upsert(std::slice::from_ref(&product))
            .await?;
        Ok(outcome)
    }

    /// Deletes every stored product, bypassing the run guard.
    pub async fn clear_all(&self) -> IngestionResult {
        let outcome = async {
            let count = self.store.count().await?;
            self.store.delete_all().await?;
            Ok::<_, AppError>(count)
        }
        .await;

        match outcome {
            Ok(removed) => {
                self.emit(&TracingReporter, IngestEvent::Cleared { removed });
                IngestionResult {
                    success: true,
                    message: format!("Successfully cleared {} products", removed),
                    total: removed,
                    new_count: 0,
                    updated_count: 0,
                    skipped_ids: Vec::new(),
                    index_warning: false,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to clear products");
                IngestionResult::failure(format!("Failed to clear products: {}", e))
            }
        }
    }

    /// Rebuilds the store index. Any failure is reported as `false`.
    pub async fn rebuild_index(&self) -> bool {
        match self.store.rebuild_index().await {
            Ok(()) => {
                tracing::info!("Search index rebuilt");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search index rebuild failed");
                false
            }
        }
    }

    /// Best-effort availability check of the remote source.
    pub async fn probe(&self) -> bool {
        self.source.probe().await
    }

    /// Returns true if the store index holds no products.
    pub async fn is_index_empty(&self) -> Result<bool, AppError> {
        self.store.is_index_empty().await
    }

    /// Looks up a stored product by external id.
    pub async fn find_product(&self, external_id: i64) -> Result<Option<ProductResponse>, AppError> {
        let product = self.store.find_by_external_id(external_id).await?;
        Ok(mapper::to_response(product.as_ref()))
    }

    /// Looks up a stored product by local id.
    pub async fn find_product_by_id(&self, id: Uuid) -> Result<Option<ProductResponse>, AppError> {
        let product = self.store.find_by_id(id).await?;
        Ok(mapper::to_response(product.as_ref()))
    }

    /// Looks up a stored product by SKU.
    pub async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductResponse>, AppError> {
        let product = self.store.find_by_sku(sku).await?;
        Ok(mapper::to_response(product.as_ref()))
    }

    /// Lists one page of stored products matching `filter`.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<PagedProducts, AppError> {
        tracing::debug!(
            category = ?filter.category,
            brand = ?filter.brand,
            page = page.page,
            size = page.size,
            "Listing products"
        );
        let slice = self.store.list(filter, page).await?;
        let content = mapper::to_response_list(Some(slice.products.as_slice()));
        Ok(PagedProducts::new(content, page, slice.total))
    }

    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        self.store.distinct_categories().await
    }

    pub async fn brands(&self) -> Result<Vec<String>, AppError> {
        self.store.distinct_brands().await
    }
}

impl<S, C> IngestionService<S, C>
where
    S: ProductStore + 'static,
    C: ProductSource + 'static,
{
    /// Starts a full ingestion run in the background, logging progress.
    ///
    /// Returns immediately. If a run is already executing the returned handle
    /// resolves at once to a failed result and the running pipeline is left
    /// untouched.
    pub fn start_full_ingestion(&self) -> IngestionHandle {
        self.start_full_ingestion_with_progress(TracingReporter)
    }

    /// Like [`Self::start_full_ingestion`], with a custom progress reporter.
    pub fn start_full_ingestion_with_progress<R>(&self, reporter: R) -> IngestionHandle
    where
        R: ProgressReporter + 'static,
    {
        if let Err(state) = self.status.begin(&self.run_state) {
            tracing::warn!(state = %state, "Rejecting full ingestion request");
            return IngestionHandle::ready(IngestionResult::failure(
                AppError::IngestionInProgress.to_string(),
            ));
        }

        reporter.report(IngestEvent::Started);

        let guard = RunGuard {
            state: Arc::clone(&self.run_state),
            status: self.status.clone(),
            finished: false,
        };
        let service = self.clone();

        IngestionHandle::spawned(tokio::spawn(async move {
            service.run_full_ingestion(&reporter, guard).await
        }))
    }
}
