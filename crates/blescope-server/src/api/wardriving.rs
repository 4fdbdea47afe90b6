//! Wardriving API endpoint.
//!
//! Serves the capture log last fetched by the wardriving poller. Enrichment
//! runs per request and is never stored.

use axum::extract::{Query, State};
use axum::Json;
use blescope_core::wardriving::WardrivingEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Wardriving query options.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WardrivingQuery {
    /// Attach normalised manufacturer, service vendors and fingerprint.
    #[serde(default)]
    pub enrich: bool,

    /// Case-insensitive substring of address, name, manufacturer or vendor.
    pub search: Option<String>,
}

/// The captured devices.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WardrivingResponse {
    /// When the dataset was fetched. `null` until the first successful refresh.
    pub fetched_at: Option<DateTime<Utc>>,

    /// Total captured devices, before filtering.
    #[schema(example = 512)]
    pub total: usize,

    /// Error of the last refresh attempt, if it failed.
    pub last_error: Option<String>,

    /// Matching entries in capture order.
    pub entries: Vec<WardrivingEntry>,
}

/// List captured devices.
#[utoipa::path(
    get,
    path = "/api/wardriving",
    tag = "wardriving",
    operation_id = "listWardriving",
    summary = "List wardriving captures",
    description = "Returns every device the scanner has ever captured, in capture \
        order. Pass `enrich=true` to attach the normalised manufacturer, known \
        service vendors and a fingerprint to each entry. When a refresh fails the \
        previous dataset is served and `last_error` is set. Until the first refresh \
        succeeds a failed refresh is answered with the feed error.",
    params(WardrivingQuery),
    responses(
        (status = 200, description = "Captured devices", body = WardrivingResponse),
        (status = 424, description = "No wardriving feed configured", body = crate::api::error::ErrorResponse),
        (status = 502, description = "Capture log is not a JSON object", body = crate::api::error::ErrorResponse),
        (status = 503, description = "Wardriving feed unreachable", body = crate::api::error::ErrorResponse),
        (status = 504, description = "Wardriving feed timed out", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn list_wardriving(
    State(state): State<AppState>,
    Query(query): Query<WardrivingQuery>,
) -> ApiResult<Json<WardrivingResponse>> {
    let wardriving = state.wardriving();
    if !wardriving.configured {
        return Err(ApiError::FailedDependency {
            error_code: "WARDRIVING_NOT_CONFIGURED".to_string(),
            message: "No wardriving feed is configured. Set feed.wardriving_url.".to_string(),
            details: None,
        });
    }
    if let (None, Some(err)) = (wardriving.fetched_at, &wardriving.last_error) {
        return Err(err.clone().into());
    }

    let matcher = state.matcher();
    let entries = wardriving
        .dataset
        .search(query.search.as_deref().unwrap_or_default())
        .into_iter()
        .map(|entry| {
            let mut entry = entry.clone();
            if query.enrich {
                entry.enrichment = Some(entry.enrichment(matcher));
            }
            entry
        })
        .collect();

    Ok(Json(WardrivingResponse {
        fetched_at: wardriving.fetched_at,
        total: wardriving.dataset.len(),
        last_error: wardriving.last_error.as_ref().map(ToString::to_string),
        entries,
    }))
}
