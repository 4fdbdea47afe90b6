//! Full pipeline runs through the public API.

use blescope_core::liveness::epoch_secs;
use blescope_core::{
    Config, DeviceRegistry, FingerprintMatcher, MovementEstimator, Poller, ScriptedSource,
    Snapshot, SourceError, Zone,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

const ADDRESS: &str = "F0:99:B6:12:34:56";

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_736_912_400, 0).unwrap()
}

fn beacon(rssi: i16, seen: DateTime<Utc>) -> Snapshot {
    Snapshot::from_json_value(&json!({
        ADDRESS: {
            "rssi": rssi,
            "name": "John's AirPods Pro",
            "manuf": "Apple, Inc. | 12020003",
            "vendor": "Apple, Inc.",
            "uuid": ["180F"],
            "up_time": epoch_secs(seen),
        }
    }))
    .unwrap()
}

#[test]
fn three_tick_oscillation() {
    let mut registry = DeviceRegistry::default();
    let signals = [-45, -80, -45];
    let zones = [Zone::Close, Zone::Far, Zone::Close];

    let mut previous: Option<(f64, f64)> = None;
    for (i, (&rssi, &zone)) in signals.iter().zip(zones.iter()).enumerate() {
        let now = t0() + Duration::seconds(i64::try_from(i).unwrap());
        let report = registry.tick(&beacon(rssi, now), now);

        let record = report.record(ADDRESS).expect("device is active every tick");
        assert!(record.is_live);
        assert_eq!(record.proximity.zone, zone);
        assert_eq!(record.fingerprint.device_type, "AirPods Pro");
        assert_eq!(
            record.model_hint.as_deref(),
            Some("Apple Audio Accessory (e.g. AirPods)")
        );

        let raw = f64::from(rssi);
        if let Some((prev_raw, prev_smoothed)) = previous {
            let raw_step = (raw - prev_raw).abs();
            let smoothed_step = (record.smoothed_signal - prev_smoothed).abs();
            assert!(smoothed_step < raw_step, "tick {}: {smoothed_step} vs {raw_step}", i + 1);
        }
        previous = Some((raw, record.smoothed_signal));

        if i == 2 {
            assert!(record.movement.score > 0);
            assert_eq!(record.movement.sample_count, 3);
        }
    }

    assert_eq!(registry.ever_seen_count(), 1);
    assert_eq!(registry.history(ADDRESS).map(|h| h.len()), Some(3));
    let view = registry.view();
    assert_eq!(view.timeline.len(), 3);
    assert!(view.timeline.iter().all(|p| p.active_count == 1));
}

#[test]
fn liveness_boundary_in_registry() {
    let mut registry = DeviceRegistry::default();

    let report = registry.tick(&beacon(-60, t0() - Duration::seconds(60)), t0());
    assert_eq!(report.active_count(), 1);

    let report = registry.tick(&beacon(-60, t0() - Duration::seconds(61)), t0());
    assert_eq!(report.active_count(), 0);
    assert_eq!(report.ever_seen_count, 1);
}

#[test]
fn flat_history_scores_zero() {
    let mut registry = DeviceRegistry::default();
    let mut last = None;
    for i in 0..15 {
        let now = t0() + Duration::seconds(i);
        last = Some(registry.tick(&beacon(-62, now), now));
    }

    let report = last.unwrap();
    let movement = &report.record(ADDRESS).unwrap().movement;
    assert_eq!(movement.score, 0);
    assert!(!movement.is_moving);

    let estimator = MovementEstimator::new(Config::default().movement);
    assert_eq!(estimator.estimate_series(&[-62.0; 15]).score, 0);
}

#[test]
fn fingerprint_precedence() {
    let matcher = FingerprintMatcher::default();
    let identify = |payload: serde_json::Value| {
        let snapshot = Snapshot::from_json_value(&json!({ ADDRESS: payload })).unwrap();
        matcher
            .identify_observation(snapshot.get(ADDRESS).unwrap())
            .device_type
    };

    assert_eq!(
        identify(json!({ "manuf": "Apple Inc.", "name": "John's AirPods Pro", "uuid": ["180F"] })),
        "AirPods Pro"
    );
    assert_eq!(
        identify(json!({ "manuf": "Apple Inc.", "name": "John's AirPods" })),
        "AirPods"
    );
    assert_eq!(
        identify(json!({ "manuf": "Unknown", "name": "Unknown Device", "uuid": [] })),
        "Unknown Device"
    );
}

#[tokio::test]
async fn poller_survives_feed_outage() {
    let source = ScriptedSource::new([
        Ok(beacon(-50, t0())),
        Err(SourceError::Malformed {
            message: "expected value at line 1 column 1".to_string(),
        }),
        Ok(Snapshot::empty()),
    ]);
    let (mut poller, receiver) = Poller::from_config(&Config::default(), source);

    poller.poll_once(t0()).await;
    let outage = poller.poll_once(t0() + Duration::seconds(1)).await;
    assert_eq!(outage.active_count(), 1);
    assert!(poller.registry().is_tracked(ADDRESS));

    let recovered = poller.poll_once(t0() + Duration::seconds(2)).await;
    assert_eq!(recovered.active_count(), 0);
    assert_eq!(recovered.purged, vec![ADDRESS.to_string()]);
    assert_eq!(receiver.borrow().ever_seen_count, 1);
    assert_eq!(receiver.borrow().tick, 3);
}
