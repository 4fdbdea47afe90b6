//! Device API endpoints.
//!
//! Serves the records of the last completed tick and the per-address signal
//! history.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use blescope_core::{
    is_valid_address, normalize_address, BlescopeError, DeviceRecord, HistogramBin, HistoryEntry,
    SortKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiResult;
use crate::state::AppState;

/// Creates the devices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_devices))
        .route("/{address}/history", get(device_history))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Filtering and ordering of the device list.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceQuery {
    /// Case-insensitive substring of name, address or manufacturer.
    pub search: Option<String>,

    /// Ordering of the returned records.
    #[serde(default)]
    #[param(inline)]
    pub sort: SortKey,
}

/// Live devices of the last tick.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DevicesResponse {
    /// Tick the records belong to, 0 before the first tick.
    #[schema(example = 42)]
    pub tick: u64,

    /// When that tick ran.
    pub updated_at: Option<DateTime<Utc>>,

    /// Whether the feed answered on that tick.
    #[schema(example = true)]
    pub feed_available: bool,

    /// Number of live devices, before filtering.
    #[schema(example = 7)]
    pub active_count: usize,

    /// Distinct addresses seen since start.
    #[schema(example = 31)]
    pub ever_seen_count: usize,

    /// Raw signal distribution of the live devices.
    pub histogram: Vec<HistogramBin>,

    /// Matching live devices in the requested order.
    pub devices: Vec<DeviceRecord>,
}

/// Signal history of one address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceHistoryResponse {
    /// Normalised address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,

    /// Retained samples, oldest first.
    pub entries: Vec<HistoryEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List live devices.
#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "devices",
    operation_id = "listDevices",
    summary = "List live devices",
    description = "Returns the device records of the last completed tick together \
        with the live and ever-seen counts and the signal histogram. Records can \
        be filtered by a search string and sorted by distance, name or signal.",
    params(DeviceQuery),
    responses(
        (status = 200, description = "Device records", body = DevicesResponse),
        (status = 400, description = "Unknown sort key")
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Json<DevicesResponse> {
    let view = state.view();
    let devices = view
        .query(query.search.as_deref(), query.sort)
        .into_iter()
        .cloned()
        .collect();

    Json(DevicesResponse {
        tick: view.tick,
        updated_at: view.updated_at,
        feed_available: view.feed_available,
        active_count: view.active_count(),
        ever_seen_count: view.ever_seen_count,
        histogram: view.histogram.clone(),
        devices,
    })
}

/// Signal history of one device.
#[utoipa::path(
    get,
    path = "/api/devices/{address}/history",
    tag = "devices",
    operation_id = "getDeviceHistory",
    summary = "Get a device's signal history",
    description = "Returns the retained raw and smoothed samples of a tracked \
        address, oldest first. Addresses are matched case-insensitively and may \
        use ':' or '-' separators.",
    params(
        ("address" = String, Path, description = "Hardware address", example = "AA:BB:CC:DD:EE:FF")
    ),
    responses(
        (status = 200, description = "History found", body = DeviceHistoryResponse),
        (status = 400, description = "Malformed address", body = crate::api::error::ErrorResponse),
        (status = 404, description = "Address not tracked", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn device_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<DeviceHistoryResponse>> {
    if !is_valid_address(&address) {
        return Err(BlescopeError::InvalidAddress(address).into());
    }

    let view = state.view();
    let entries = view
        .history(&address)
        .ok_or_else(|| BlescopeError::DeviceNotTracked(address.clone()))?
        .to_vec();

    Ok(Json(DeviceHistoryResponse {
        address: normalize_address(&address),
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_to_distance() {
        let query: DeviceQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, SortKey::Distance);
        assert!(query.search.is_none());
    }

    #[test]
    fn test_query_parses_sort_key() {
        let query: DeviceQuery = serde_json::from_str(r#"{"sort":"rssi","search":"tile"}"#).unwrap();
        assert_eq!(query.sort, SortKey::Rssi);
        assert_eq!(query.search.as_deref(), Some("tile"));
    }
}
