//! Health check API endpoint.
//!
//! Provides a simple health check endpoint for monitoring and load balancers.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "tick": 1234,
    "feed_available": true,
    "uptime_secs": 3600
}))]
pub struct HealthResponse {
    /// `ok` while the last feed fetch succeeded, `degraded` otherwise.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Number of completed registry ticks.
    #[schema(example = 1234)]
    pub tick: u64,

    /// Whether the most recent feed fetch succeeded.
    #[schema(example = true)]
    pub feed_available: bool,

    /// Server uptime in seconds.
    #[schema(example = 3600)]
    pub uptime_secs: u64,
}

/// Creates the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
///
/// Always answers 200. Before the first tick the feed has not been tried yet
/// and the status is `ok`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns the service version, the number of completed ticks and \
        whether the observation feed answered on the last tick. Use this endpoint \
        for load balancer health checks and monitoring.",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let view = state.view();
    let healthy = view.tick == 0 || view.feed_available;

    Json(HealthResponse {
        status: (if healthy { "ok" } else { "degraded" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tick: view.tick,
        feed_available: view.feed_available,
        uptime_secs: state.uptime_secs(),
    })
}
