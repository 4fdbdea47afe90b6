//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `devices` - Live device records and per-address history
//! - `timeline` - Active-count series
//! - `wardriving` - Capture log, optionally enriched
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod devices;
pub mod error;
pub mod health;
pub mod openapi;
pub mod timeline;
pub mod wardriving;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                       - Health check
/// /api
/// ├── /devices                  - Live device records (search, sort)
/// ├── /devices/{address}/history - Signal history of one address
/// ├── /timeline                 - Active-count series
/// ├── /wardriving               - Capture log (enrich, search)
/// └── /openapi.json             - OpenAPI specification
/// /docs                         - Swagger UI
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .nest("/devices", devices::router())
                .route("/timeline", get(timeline::get_timeline))
                .route("/wardriving", get(wardriving::list_wardriving))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
