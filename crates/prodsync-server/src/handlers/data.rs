//! Data loading endpoints.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use prodsync_core::{AppError, IngestionResult};

use crate::dto::{
    ApiResponse, ApiStatusEnvelope, ApiStatusResponse, IndexRebuildEnvelope, IndexRebuildResponse,
    IngestionEnvelope, IngestionResultDto, LoadQuery, LoadingStatusEnvelope,
    LoadingStatusResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Wraps an ingestion result: 200 on success, 500 with the result otherwise.
fn result_response(
    result: IngestionResult,
    success_message: &str,
    path: &str,
) -> (StatusCode, Json<IngestionEnvelope>) {
    let (status, message) = if result.success {
        (StatusCode::OK, success_message.to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, result.message.clone())
    };

    (
        status,
        Json(ApiResponse::new(
            status,
            message,
            IngestionResultDto::from(result),
            path,
        )),
    )
}

/// Load the whole catalogue.
///
/// Only one full load runs at a time; a concurrent request gets 409 and the
/// running load is left untouched. With `background=true` the load keeps
/// running after the response and progress is available at
/// GET /api/v1/data/status.
#[utoipa::path(
    post,
    path = "/api/v1/data/load",
    params(LoadQuery),
    responses(
        (status = 200, description = "Data loading completed", body = IngestionEnvelope),
        (status = 202, description = "Data loading started", body = LoadingStatusEnvelope),
        (status = 409, description = "Data loading is already in progress"),
        (status = 500, description = "Data loading failed", body = IngestionEnvelope),
    ),
    tag = "data"
)]
pub async fn load_all(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<LoadQuery>,
) -> Result<Response, ApiError> {
    tracing::info!(background = query.background, "Received full load request");

    let handle = state.ingestion.start_full_ingestion();
    if handle.is_rejected() {
        return Err(AppError::IngestionInProgress.into());
    }

    if query.background {
        // Dropping the handle detaches the run; it keeps the run guard
        let status = LoadingStatusResponse::from(state.ingestion.status());
        let body = ApiResponse::new(
            StatusCode::ACCEPTED,
            "Data loading started",
            status,
            uri.path(),
        );
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let result = handle.await;
    Ok(result_response(result, "Data loading completed", uri.path()).into_response())
}

/// Load one product by external id.
#[utoipa::path(
    post,
    path = "/api/v1/data/load/{external_id}",
    params(
        ("external_id" = i64, Path, description = "External product identifier", example = 1)
    ),
    responses(
        (status = 200, description = "Product loaded successfully", body = IngestionEnvelope),
        (status = 400, description = "Invalid external id"),
        (status = 500, description = "Product could not be loaded", body = IngestionEnvelope),
    ),
    tag = "data"
)]
pub async fn load_one(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(external_id): Path<i64>,
) -> (StatusCode, Json<IngestionEnvelope>) {
    tracing::info!(external_id, "Received single product load request");

    let result = state.ingestion.ingest_one(external_id).await;
    result_response(result, "Product loaded successfully", uri.path())
}

/// Current (or last) full load progress.
#[utoipa::path(
    get,
    path = "/api/v1/data/status",
    responses(
        (status = 200, description = "Loading status", body = LoadingStatusEnvelope),
    ),
    tag = "data"
)]
pub async fn get_status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Json<LoadingStatusEnvelope> {
    Json(ApiResponse::new(
        StatusCode::OK,
        "Loading status retrieved",
        LoadingStatusResponse::from(state.ingestion.status()),
        uri.path(),
    ))
}

/// Delete every stored product.
///
/// Not coordinated with a running full load.
#[utoipa::path(
    delete,
    path = "/api/v1/data/clear",
    responses(
        (status = 200, description = "Products cleared successfully", body = IngestionEnvelope),
        (status = 500, description = "Error clearing products", body = IngestionEnvelope),
    ),
    tag = "data"
)]
pub async fn clear_all(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> (StatusCode, Json<IngestionEnvelope>) {
    tracing::info!("Received request to clear all products");

    let result = state.ingestion.clear_all().await;
    result_response(result, "Products cleared successfully", uri.path())
}

/// Remote catalogue availability.
///
/// The probe bypasses the circuit breaker, so an open circuit and a
/// reachable catalogue can be reported together.
#[utoipa::path(
    get,
    path = "/api/v1/data/api-status",
    responses(
        (status = 200, description = "Availability checked", body = ApiStatusEnvelope),
    ),
    tag = "data"
)]
pub async fn api_status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Json<ApiStatusEnvelope> {
    let available = state.ingestion.probe().await;
    let message = if available {
        "External API is available"
    } else {
        "External API is not available"
    };

    Json(ApiResponse::new(
        StatusCode::OK,
        message,
        ApiStatusResponse::new(available, state.api_client.breaker_stats()),
        uri.path(),
    ))
}

/// Rebuild the product search index.
#[utoipa::path(
    post,
    path = "/api/v1/data/rebuild-index",
    responses(
        (status = 200, description = "Index rebuilt", body = IndexRebuildEnvelope),
        (status = 500, description = "Index rebuild failed", body = IndexRebuildEnvelope),
    ),
    tag = "data"
)]
pub async fn rebuild_index(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> (StatusCode, Json<IndexRebuildEnvelope>) {
    tracing::info!("Received request to rebuild search index");

    let rebuilt = state.ingestion.rebuild_index().await;
    let (status, message) = if rebuilt {
        (StatusCode::OK, "Search index rebuilt successfully")
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to rebuild search index",
        )
    };

    (
        status,
        Json(ApiResponse::new(
            status,
            message,
            IndexRebuildResponse { rebuilt },
            uri.path(),
        )),
    )
}
