//! OpenAPI specification generation for the blescope API.
//!
//! The document is served at `/api/openapi.json`, rendered by Swagger UI at
//! `/docs` and written to disk by the `gen-openapi` binary for client
//! generation in the presentation layer.

use axum::Json;
use blescope_core::fingerprint::{Category, FingerprintResult, Severity, Threat, ThreatLevel};
use blescope_core::manufacturer::{Likelihood, NormalizedManufacturer, ServiceVendor};
use blescope_core::movement::{Direction, MovementMetrics, Velocity};
use blescope_core::proximity::{HistogramBin, ProximityResult, Zone};
use blescope_core::registry::{DeviceRecord, SortKey, TimelinePoint};
use blescope_core::wardriving::{Enrichment, WardrivingEntry};
use blescope_core::HistoryEntry;
use utoipa::OpenApi;

use super::devices::{DeviceHistoryResponse, DevicesResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::timeline::TimelineResponse;
use super::wardriving::WardrivingResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a pretty-printed string.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for blescope.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "blescope API",
        version = "0.1.0",
        description = r#"
# blescope API

blescope watches the output of a passive BLE scanner and turns noisy beacon
observations into classified device records.

## Overview

Once per tick the server fetches the scanner's `address -> observation`
mapping and, for every reported address:

1. **Smooths** the signal strength with a scalar Kalman filter
2. **Scores movement** from the variance, step size and trend of the smoothed window
3. **Classifies proximity** into close (`<2m`), medium (`2-5m`) and far (`>5m`)
4. **Checks liveness** against the last-seen timeout
5. **Fingerprints** the device from its name, manufacturer and advertised services

Endpoints serve the result of the last completed tick and never block on the feed.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local blescope server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks and feed status"
        ),
        (
            name = "devices",
            description = "Live device records, signal history and the active-count timeline"
        ),
        (
            name = "wardriving",
            description = "Cumulative capture log of every device ever heard"
        )
    ),
    paths(
        super::health::health_check,
        super::devices::list_devices,
        super::devices::device_history,
        super::timeline::get_timeline,
        super::wardriving::list_wardriving,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Response types
            HealthResponse,
            DevicesResponse,
            DeviceHistoryResponse,
            TimelineResponse,
            WardrivingResponse,
            // Device record types
            DeviceRecord,
            ServiceVendor,
            Likelihood,
            ProximityResult,
            Zone,
            MovementMetrics,
            Direction,
            Velocity,
            FingerprintResult,
            Category,
            Threat,
            ThreatLevel,
            Severity,
            HistoryEntry,
            HistogramBin,
            TimelinePoint,
            SortKey,
            // Wardriving types
            WardrivingEntry,
            Enrichment,
            NormalizedManufacturer,
        )
    )
)]
pub struct ApiDoc;
