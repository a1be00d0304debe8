//! Router configuration and route composition.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ServerConfig;
use crate::handlers::{data, health, products};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let data_routes = Router::new()
        .route("/load", post(data::load_all))
        .route("/load/:external_id", post(data::load_one))
        .route("/status", get(data::get_status))
        .route("/clear", delete(data::clear_all))
        .route("/api-status", get(data::api_status))
        .route("/rebuild-index", post(data::rebuild_index));

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/products", get(products::list_products))
        .route("/products/categories", get(products::list_categories))
        .route("/products/brands", get(products::list_brands))
        .route("/products/id/:id", get(products::get_product_by_id))
        .route("/products/sku/:sku", get(products::get_product_by_sku))
        .route("/products/:external_id", get(products::get_product))
        .nest("/data", data_routes);

    let cors_layer = build_cors_layer(&config.cors_origins);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configuration.
///
/// If `origins` is "*", allows any origin (for development).
/// Otherwise, parses comma-separated origins; unparsable entries are dropped.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        if allowed.is_empty() {
            tracing::warn!(origins, "No valid CORS origins configured");
        }
        cors.allow_origin(allowed)
    }
}
