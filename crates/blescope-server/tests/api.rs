//! Route tests against a registry driven by fixed snapshots.

use std::sync::Arc;

use axum_test::TestServer;
use blescope_core::liveness::epoch_secs;
use blescope_core::{Config, DeviceRegistry, RegistryView, Snapshot, SourceError, WardrivingDataset};
use blescope_server::feed::WardrivingState;
use blescope_server::{create_router, AppState};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;

const AIRPODS: &str = "F0:99:B6:12:34:56";
const TILE: &str = "C4:7C:8D:00:11:22";

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_736_912_400, 0).unwrap()
}

fn snapshot(now: DateTime<Utc>, airpods_rssi: i16) -> Snapshot {
    Snapshot::from_json_value(&json!({
        AIRPODS: {
            "rssi": airpods_rssi,
            "name": "John's AirPods Pro",
            "manuf": "Apple, Inc. | 12020003",
            "uuid": ["180F"],
            "up_time": epoch_secs(now),
        },
        TILE: {
            "rssi": -85,
            "name": false,
            "manuf": "Tile, Inc.",
            "uuid": ["FE9F"],
            "up_time": epoch_secs(now),
        }
    }))
    .unwrap()
}

fn view_after_ticks() -> RegistryView {
    let mut registry = DeviceRegistry::default();
    for (i, rssi) in [-45, -80, -45].into_iter().enumerate() {
        let now = t0() + Duration::seconds(i64::try_from(i).unwrap());
        registry.tick(&snapshot(now, rssi), now);
    }
    registry.view()
}

fn server_with(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

fn server() -> TestServer {
    server_with(AppState::from_view(&Config::default(), view_after_ticks()))
}

#[tokio::test]
async fn health_reports_tick() {
    let response = server().get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tick"], 3);
    assert_eq!(body["feed_available"], true);
}

#[tokio::test]
async fn health_degraded_after_failed_fetch() {
    let mut registry = DeviceRegistry::default();
    registry.tick(&snapshot(t0(), -50), t0());
    registry.tick_unavailable(t0() + Duration::seconds(1));

    let server = server_with(AppState::from_view(&Config::default(), registry.view()));
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn devices_lists_live_records() {
    let response = server().get("/api/devices").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["active_count"], 2);
    assert_eq!(body["ever_seen_count"], 2);
    assert_eq!(body["histogram"].as_array().unwrap().len(), 8);

    let devices = body["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    // Distance order: the close AirPods before the far tracker.
    assert_eq!(devices[0]["address"], AIRPODS);
    assert_eq!(devices[0]["fingerprint"]["device_type"], "AirPods Pro");
    assert_eq!(devices[1]["fingerprint"]["device_type"], "Tile Tracker");
    assert_eq!(devices[1]["fingerprint"]["threat_level"]["label"], "Tracking Device");
}

#[tokio::test]
async fn devices_search_and_sort() {
    let server = server();

    let body: Value = server
        .get("/api/devices")
        .add_query_param("search", "tile")
        .await
        .json();
    assert_eq!(body["devices"].as_array().unwrap().len(), 1);
    assert_eq!(body["active_count"], 2);

    let body: Value = server
        .get("/api/devices")
        .add_query_param("sort", "rssi")
        .await
        .json();
    assert_eq!(body["devices"][0]["address"], AIRPODS);

    server
        .get("/api/devices")
        .add_query_param("sort", "loudness")
        .expect_failure()
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn history_of_tracked_address() {
    let response = server()
        .get("/api/devices/f0-99-b6-12-34-56/history")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["address"], AIRPODS);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1]["raw_value"], -80.0);
}

#[tokio::test]
async fn history_rejects_malformed_address() {
    let response = server()
        .get("/api/devices/not-a-mac/history")
        .expect_failure()
        .await;
    response.assert_status_bad_request();

    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_ADDRESS");
}

#[tokio::test]
async fn history_of_unknown_address() {
    let response = server()
        .get("/api/devices/00:00:00:00:00:01/history")
        .expect_failure()
        .await;
    response.assert_status_not_found();

    let body: Value = response.json();
    assert_eq!(body["error"], "DEVICE_NOT_TRACKED");
}

#[tokio::test]
async fn timeline_has_one_point_per_tick() {
    let body: Value = server().get("/api/timeline").await.json();

    assert_eq!(body["capacity"], 60);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p["active_count"] == 2));
}

#[tokio::test]
async fn wardriving_unconfigured() {
    let response = server().get("/api/wardriving").expect_failure().await;
    response.assert_status(axum::http::StatusCode::FAILED_DEPENDENCY);
}

#[tokio::test]
async fn wardriving_with_enrichment() {
    let dataset = WardrivingDataset::from_json_value(&json!({
        "1": { "addr": AIRPODS, "rssi": -61, "name": "John's AirPods Pro",
               "manuf": "Apple, Inc. | 12020003", "uuid": ["180F"], "up_time": 10.0 },
        "2": { "addr": TILE, "rssi": -88, "name": false,
               "manuf": "Tile, Inc.", "uuid": ["FE9F"], "up_time": 20.0 }
    }))
    .unwrap();
    let (_tx, wardriving) = watch::channel(Arc::new(WardrivingState {
        configured: true,
        dataset,
        fetched_at: Some(t0()),
        last_error: None,
    }));
    let (_tx, devices) = watch::channel(Arc::new(RegistryView::default()));
    let server = server_with(AppState::new(&Config::default(), devices, wardriving));

    let plain: Value = server.get("/api/wardriving").await.json();
    assert_eq!(plain["total"], 2);
    assert!(plain["entries"][0].get("enrichment").is_none());

    let enriched: Value = server
        .get("/api/wardriving")
        .add_query_param("enrich", "true")
        .await
        .json();
    let entries = enriched["entries"].as_array().unwrap();
    assert_eq!(entries[0]["enrichment"]["fingerprint"]["device_type"], "AirPods Pro");
    assert_eq!(
        entries[0]["enrichment"]["manufacturer"]["model_hint"],
        "Apple Audio Accessory (e.g. AirPods)"
    );
    assert_eq!(entries[1]["enrichment"]["fingerprint"]["device_type"], "Tile Tracker");

    let filtered: Value = server
        .get("/api/wardriving")
        .add_query_param("search", "tile")
        .await
        .json();
    assert_eq!(filtered["entries"].as_array().unwrap().len(), 1);
    assert_eq!(filtered["total"], 2);
}

fn server_with_wardriving(state: WardrivingState) -> TestServer {
    let (_tx, wardriving) = watch::channel(Arc::new(state));
    let (_tx, devices) = watch::channel(Arc::new(RegistryView::default()));
    server_with(AppState::new(&Config::default(), devices, wardriving))
}

#[tokio::test]
async fn wardriving_feed_error_before_first_refresh() {
    let server = server_with_wardriving(WardrivingState {
        configured: true,
        last_error: Some(SourceError::Timeout { timeout_ms: 5000 }),
        ..WardrivingState::default()
    });
    let response = server.get("/api/wardriving").expect_failure().await;
    response.assert_status(axum::http::StatusCode::GATEWAY_TIMEOUT);
    let body: Value = response.json();
    assert_eq!(body["error"], "FEED_TIMEOUT");

    let server = server_with_wardriving(WardrivingState {
        configured: true,
        last_error: Some(SourceError::Malformed {
            message: "expected an object".to_string(),
        }),
        ..WardrivingState::default()
    });
    server
        .get("/api/wardriving")
        .expect_failure()
        .await
        .assert_status(axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn wardriving_serves_stale_dataset_after_failed_refresh() {
    let dataset = WardrivingDataset::from_json_value(&json!({
        "1": { "addr": TILE, "rssi": -88, "name": false,
               "manuf": "Tile, Inc.", "uuid": ["FE9F"], "up_time": 20.0 }
    }))
    .unwrap();
    let server = server_with_wardriving(WardrivingState {
        configured: true,
        dataset,
        fetched_at: Some(t0()),
        last_error: Some(SourceError::Unavailable {
            message: "connection refused".to_string(),
        }),
    });

    let response = server.get("/api/wardriving").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert!(body["last_error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let body: Value = server().get("/api/openapi.json").await.json();
    assert_eq!(body["info"]["title"], "blescope API");
    assert!(body["paths"]["/api/devices/{address}/history"].is_object());
}
