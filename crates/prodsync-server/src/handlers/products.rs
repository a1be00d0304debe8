//! Product retrieval endpoints.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::dto::{
    ApiResponse, NamesEnvelope, NamesResponse, ProductDto, ProductEnvelope, ProductListQuery,
    ProductPageDto, ProductPageEnvelope,
};
use crate::error::ApiError;
use crate::state::AppState;

fn found(product: prodsync_core::ProductResponse, path: &str) -> Json<ProductEnvelope> {
    Json(ApiResponse::new(
        StatusCode::OK,
        "Product retrieved successfully",
        ProductDto::from(product),
        path,
    ))
}

/// Get a stored product by its external id.
#[utoipa::path(
    get,
    path = "/api/v1/products/{external_id}",
    params(
        ("external_id" = i64, Path, description = "External product identifier", example = 1)
    ),
    responses(
        (status = 200, description = "Product found", body = ProductEnvelope),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(external_id): Path<i64>,
) -> Result<Json<ProductEnvelope>, ApiError> {
    let product = state
        .ingestion
        .find_product(external_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {}", external_id)))?;

    Ok(found(product, uri.path()))
}

/// Get a stored product by its local id.
#[utoipa::path(
    get,
    path = "/api/v1/products/id/{id}",
    params(
        ("id" = Uuid, Path, description = "Local product identifier")
    ),
    responses(
        (status = 200, description = "Product found", body = ProductEnvelope),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn get_product_by_id(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductEnvelope>, ApiError> {
    let product = state
        .ingestion
        .find_product_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found with id: {}", id)))?;

    Ok(found(product, uri.path()))
}

/// Get a stored product by SKU.
#[utoipa::path(
    get,
    path = "/api/v1/products/sku/{sku}",
    params(
        ("sku" = String, Path, description = "Stock keeping unit", example = "RCH45Q1A")
    ),
    responses(
        (status = 200, description = "Product found", body = ProductEnvelope),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn get_product_by_sku(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(sku): Path<String>,
) -> Result<Json<ProductEnvelope>, ApiError> {
    let product = state
        .ingestion
        .find_product_by_sku(&sku)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found with SKU: {}", sku)))?;

    Ok(found(product, uri.path()))
}

/// List stored products, optionally by category and brand.
///
/// Products are ordered by title.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved", body = ProductPageEnvelope),
        (status = 400, description = "Invalid paging parameters"),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductPageEnvelope>, ApiError> {
    let (filter, page) = query.into_parts().map_err(ApiError::BadRequest)?;
    let paged = state.ingestion.list_products(&filter, page).await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        "Products retrieved successfully",
        ProductPageDto::from(paged),
        uri.path(),
    )))
}

/// List the distinct categories of stored products.
#[utoipa::path(
    get,
    path = "/api/v1/products/categories",
    responses(
        (status = 200, description = "Categories retrieved", body = NamesEnvelope),
    ),
    tag = "products"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<NamesEnvelope>, ApiError> {
    let categories = state.ingestion.categories().await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        "Categories retrieved",
        NamesResponse::from(categories),
        uri.path(),
    )))
}

/// List the distinct brands of stored products.
#[utoipa::path(
    get,
    path = "/api/v1/products/brands",
    responses(
        (status = 200, description = "Brands retrieved", body = NamesEnvelope),
    ),
    tag = "products"
)]
pub async fn list_brands(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<NamesEnvelope>, ApiError> {
    let brands = state.ingestion.brands().await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        "Brands retrieved",
        NamesResponse::from(brands),
        uri.path(),
    )))
}
