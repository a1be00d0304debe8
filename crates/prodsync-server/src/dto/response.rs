//! Response DTOs for API endpoints.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use prodsync_core::{
    CircuitBreakerStats, Dimensions, IngestionResult, Meta, PagedProducts, ProductResponse, Review,
    RunStatus,
};

// =============================================================================
// Envelope
// =============================================================================

/// Envelope wrapping every successful data endpoint response.
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    IngestionEnvelope = ApiResponse<IngestionResultDto>,
    LoadingStatusEnvelope = ApiResponse<LoadingStatusResponse>,
    ApiStatusEnvelope = ApiResponse<ApiStatusResponse>,
    IndexRebuildEnvelope = ApiResponse<IndexRebuildResponse>,
    ProductEnvelope = ApiResponse<ProductDto>,
    ProductPageEnvelope = ApiResponse<ProductPageDto>,
    NamesEnvelope = ApiResponse<NamesResponse>
)]
pub struct ApiResponse<T> {
    /// HTTP status code of the response
    pub status: u16,
    /// Human-readable outcome
    pub message: String,
    /// Payload, if any
    pub data: Option<T>,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
    /// Request path
    pub path: String,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T, path: &str) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
            path: path.to_string(),
        }
    }
}

// =============================================================================
// Ingestion
// =============================================================================

/// Outcome of a load or clear operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestionResultDto {
    pub success: bool,
    pub message: String,
    /// Products written (or removed, for a clear)
    pub total: u64,
    pub new_count: u64,
    pub updated_count: u64,
    /// External ids skipped during a full load
    pub skipped_ids: Vec<i64>,
    /// True when the search index rebuild failed after loading
    pub index_warning: bool,
}

impl From<IngestionResult> for IngestionResultDto {
    fn from(r: IngestionResult) -> Self {
        Self {
            success: r.success,
            message: r.message,
            total: r.total,
            new_count: r.new_count,
            updated_count: r.updated_count,
            skipped_ids: r.skipped_ids,
            index_warning: r.index_warning,
        }
    }
}

/// Snapshot of the current (or last) full load.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoadingStatusResponse {
    /// Whether a full load is running
    pub loading: bool,
    /// Phase message
    pub status: String,
    /// Percentage, 0 to 100
    pub progress: u8,
    /// Run state: idle, running, completed or failed
    pub state: String,
}

impl From<RunStatus> for LoadingStatusResponse {
    fn from(s: RunStatus) -> Self {
        Self {
            loading: s.running,
            status: s.phase,
            progress: s.percent,
            state: s.state.to_string(),
        }
    }
}

/// Outcome of a manual index rebuild.
#[derive(Debug, Serialize, ToSchema)]
pub struct IndexRebuildResponse {
    pub rebuilt: bool,
}

// =============================================================================
// Remote source
// =============================================================================

/// Availability of the remote catalogue.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiStatusResponse {
    /// Result of a live probe (bypasses the circuit breaker)
    pub available: bool,
    /// Circuit breaker state: closed, open or half-open
    pub circuit_state: String,
    /// Failures inside the sliding window
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Seconds until an open circuit admits a trial call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiStatusResponse {
    pub fn new(available: bool, stats: CircuitBreakerStats) -> Self {
        Self {
            available,
            circuit_state: stats.state.to_string(),
            failure_count: stats.failure_count,
            last_error: stats.last_error,
            retry_after_secs: stats.time_until_half_open.map(|d| d.as_secs()),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
    /// Circuit breaker state of the remote catalogue
    pub source_circuit: String,
}

/// Status of an individual service component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    /// Optional message (e.g., error details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Products
// =============================================================================

/// Package dimensions.
#[derive(Debug, Serialize, ToSchema)]
pub struct DimensionsDto {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
}

impl From<Dimensions> for DimensionsDto {
    fn from(d: Dimensions) -> Self {
        Self {
            width: d.width,
            height: d.height,
            depth: d.depth,
        }
    }
}

/// Customer review.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewDto {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
}

impl From<Review> for ReviewDto {
    fn from(r: Review) -> Self {
        Self {
            rating: r.rating,
            comment: r.comment,
            date: r.review_date,
            reviewer_name: r.reviewer_name,
            reviewer_email: r.reviewer_email,
        }
    }
}

/// Catalogue metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetaDto {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
}

impl From<Meta> for MetaDto {
    fn from(m: Meta) -> Self {
        Self {
            created_at: m.created_at,
            updated_at: m.updated_at,
            barcode: m.barcode,
            qr_code: m.qr_code,
        }
    }
}

/// A stored product.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDto {
    /// Local identifier
    pub id: Uuid,
    /// Identifier assigned by the remote catalogue
    pub external_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
    pub tags: Vec<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<i32>,
    pub dimensions: Option<DimensionsDto>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Vec<ReviewDto>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: Option<i32>,
    pub meta: Option<MetaDto>,
    pub images: Vec<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductResponse> for ProductDto {
    fn from(p: ProductResponse) -> Self {
        Self {
            id: p.id,
            external_id: p.external_id,
            title: p.title,
            description: p.description,
            category: p.category,
            price: p.price,
            discount_percentage: p.discount_percentage,
            rating: p.rating,
            stock: p.stock,
            tags: p.tags,
            brand: p.brand,
            sku: p.sku,
            weight: p.weight,
            dimensions: p.dimensions.map(DimensionsDto::from),
            warranty_information: p.warranty_information,
            shipping_information: p.shipping_information,
            availability_status: p.availability_status,
            reviews: p.reviews.into_iter().map(ReviewDto::from).collect(),
            return_policy: p.return_policy,
            minimum_order_quantity: p.minimum_order_quantity,
            meta: p.meta.map(MetaDto::from),
            images: p.images,
            thumbnail: p.thumbnail,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// One page of stored products.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductPageDto {
    pub content: Vec<ProductDto>,
    /// Zero-based page number
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
    pub first: bool,
    pub last: bool,
    pub number_of_elements: usize,
    pub empty: bool,
}

impl From<PagedProducts> for ProductPageDto {
    fn from(p: PagedProducts) -> Self {
        let (first, last) = (p.is_first(), p.is_last());
        let number_of_elements = p.content.len();
        Self {
            content: p.content.into_iter().map(ProductDto::from).collect(),
            page: p.page,
            size: p.size,
            total_elements: p.total_elements,
            total_pages: p.total_pages,
            first,
            last,
            number_of_elements,
            empty: number_of_elements == 0,
        }
    }
}

/// Distinct category or brand names.
#[derive(Debug, Serialize, ToSchema)]
pub struct NamesResponse {
    pub names: Vec<String>,
    pub count: usize,
}

impl From<Vec<String>> for NamesResponse {
    fn from(names: Vec<String>) -> Self {
        Self {
            count: names.len(),
            names,
        }
    }
}
