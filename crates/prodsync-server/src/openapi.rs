//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::dto::{
    ApiStatusEnvelope, ApiStatusResponse, DimensionsDto, HealthResponse, IndexRebuildEnvelope,
    IndexRebuildResponse, IngestionEnvelope, IngestionResultDto, LoadingStatusEnvelope,
    LoadingStatusResponse, MetaDto, NamesEnvelope, NamesResponse, ProductDto, ProductEnvelope,
    ProductPageDto, ProductPageEnvelope, ReviewDto, ServiceStatus,
};
use crate::error::ErrorResponse;
use crate::handlers::{data, health, products};

/// OpenAPI documentation for the prodsync API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Prodsync API",
        version = "1.0.0",
        description = "Resilient product ingestion from a remote catalogue.

Prodsync copies the product catalogue of a remote HTTP API into PostgreSQL.
Remote calls are guarded by a timeout, bounded retries and a circuit breaker;
only one full load runs at a time.

## Quick Start

1. Check server health: `GET /api/v1/health`
2. Check the remote catalogue: `GET /api/v1/data/api-status`
3. Load everything: `POST /api/v1/data/load?background=true`
4. Watch progress: `GET /api/v1/data/status`
5. Browse the copy: `GET /api/v1/products?category=beauty&page=0&size=20`
",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health::health_check,
        data::load_all,
        data::load_one,
        data::get_status,
        data::clear_all,
        data::api_status,
        data::rebuild_index,
        products::get_product,
        products::get_product_by_id,
        products::get_product_by_sku,
        products::list_products,
        products::list_categories,
        products::list_brands,
    ),
    components(
        schemas(
            // Envelopes
            IngestionEnvelope,
            LoadingStatusEnvelope,
            ApiStatusEnvelope,
            IndexRebuildEnvelope,
            ProductEnvelope,
            ProductPageEnvelope,
            NamesEnvelope,
            // Response types
            IngestionResultDto,
            LoadingStatusResponse,
            ApiStatusResponse,
            IndexRebuildResponse,
            HealthResponse,
            ServiceStatus,
            ProductDto,
            ProductPageDto,
            NamesResponse,
            DimensionsDto,
            ReviewDto,
            MetaDto,
            ErrorResponse,
        )
    ),
    tags(
        (name = "system", description = "System health"),
        (name = "data", description = "Catalogue ingestion operations"),
        (name = "products", description = "Stored product retrieval"),
    )
)]
pub struct ApiDoc;
