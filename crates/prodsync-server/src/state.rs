use tokio_util::sync::CancellationToken;

use prodsync_client::ProductApiClient;
use prodsync_core::{IngestConfig, IngestionService};
use prodsync_db::ProductRepository;

/// Ingestion service wired to the production store and source.
pub type Ingestion = IngestionService<ProductRepository, ProductApiClient>;

/// Shared application state for all handlers.
///
/// This is wrapped in Arc internally by Axum when using `with_state()`,
/// so all fields must implement Clone (which they do via internal `Arc`s).
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator for full and single-product ingestion
    pub ingestion: Ingestion,

    /// Product repository for health checks
    pub product_repo: ProductRepository,

    /// Catalogue client, for circuit breaker monitoring
    pub api_client: ProductApiClient,

    /// Cancellation token for graceful shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    /// Creates a new application state with all services initialized.
    pub fn new(
        pool: sqlx::PgPool,
        api_client: ProductApiClient,
        ingest_config: IngestConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        let product_repo = ProductRepository::new(pool);

        Self {
            ingestion: IngestionService::with_config(
                product_repo.clone(),
                api_client.clone(),
                ingest_config,
            ),
            product_repo,
            api_client,
            shutdown_token,
        }
    }
}
