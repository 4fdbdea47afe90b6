//! Per-tick orchestration of the inference pipeline.
//!
//! The [`DeviceRegistry`] exclusively owns all per-address state: Kalman
//! filters, history buffers, the ever-seen set and the missing-tick counters.
//! Each call to [`DeviceRegistry::tick`] runs every reported address through
//! smoothing, history, movement, proximity and fingerprinting, then filters
//! the resulting [`DeviceRecord`]s by liveness.
//!
//! State lifecycle:
//!
//! - An address reported but stale keeps its filter and history, so smoothing
//!   resumes where it left off when it becomes live again.
//! - An address missing from `purge_after_missing_ticks` consecutive snapshots
//!   loses its filter and history. If it comes back, smoothing starts fresh.
//! - With `purge_stale_after_secs` set, a reported address older than that is
//!   purged as well.
//! - The ever-seen set only grows.
//! - A failed fetch ([`DeviceRegistry::tick_unavailable`]) changes no state;
//!   it only ages out the previously active records.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::config::Config;
use crate::fingerprint::{FingerprintMatcher, FingerprintResult};
use crate::history::{HistoryEntry, HistoryStore};
use crate::liveness::{age_secs, epoch_secs, LivenessTracker};
use crate::manufacturer::{service_vendors, ServiceVendor};
use crate::movement::{MovementEstimator, MovementMetrics};
use crate::observation::{normalize_address, RawObservation, ServiceId, Snapshot};
use crate::proximity::{classify, histogram, HistogramBin, ProximityResult};
use crate::smoother::SignalSmoother;

/// Everything known about one device at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceRecord {
    /// Upper-case hardware address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,
    /// Advertised name or `"Unknown Device"`.
    #[schema(example = "John's AirPods Pro")]
    pub name: String,
    /// Manufacturer, vendor, or `"Unknown"`.
    #[schema(example = "Apple, Inc.")]
    pub manufacturer: String,
    /// OUI vendor or `"Unknown"`.
    pub vendor: String,
    /// Device class decoded from the manufacturer payload.
    pub model_hint: Option<String>,
    /// Advertised services.
    #[schema(value_type = Vec<String>)]
    pub service_ids: Vec<ServiceId>,
    /// Advertised services registered to a known vendor.
    pub service_vendors: Vec<ServiceVendor>,
    /// Raw signal strength this tick, in dBm.
    #[schema(example = -58)]
    pub signal_strength: i16,
    /// Kalman estimate after this tick, in dBm.
    #[schema(example = -60.2)]
    pub smoothed_signal: f64,
    /// Zone of the raw signal.
    pub proximity: ProximityResult,
    /// Movement over the smoothed history.
    pub movement: MovementMetrics,
    /// Identification.
    pub fingerprint: FingerprintResult,
    /// When the scanner last heard the device, in epoch seconds.
    pub last_seen_epoch_secs: f64,
    /// Seconds since `last_seen_epoch_secs`.
    pub age_secs: f64,
    /// Within the liveness timeout.
    pub is_live: bool,
    /// When the registry first saw the address.
    pub first_seen: DateTime<Utc>,
}

/// Active device count at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimelinePoint {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Tick time.
    pub at: DateTime<Utc>,
    /// Live devices after the tick.
    pub active_count: usize,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Tick time.
    pub at: DateTime<Utc>,
    /// Live devices, in address order.
    pub active: Vec<DeviceRecord>,
    /// Size of the ever-seen set.
    pub ever_seen_count: usize,
    /// Addresses seen for the first time this tick.
    pub newly_seen: Vec<String>,
    /// Addresses whose state was dropped this tick.
    pub purged: Vec<String>,
    /// `false` when the fetch failed and only ageing was applied.
    pub feed_available: bool,
}

impl TickReport {
    /// Number of live devices.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active record for `address`.
    #[must_use]
    pub fn record(&self, address: &str) -> Option<&DeviceRecord> {
        let address = normalize_address(address);
        self.active.iter().find(|r| r.address == address)
    }
}

/// How to order device records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Nearest zone first.
    #[default]
    Distance,
    /// Display name, case-insensitive.
    Name,
    /// Strongest raw signal first.
    Rssi,
}

/// Records whose name, address or manufacturer contains `search`
/// (case-insensitive). An empty or absent search keeps everything.
#[must_use]
pub fn filter_records<'a>(records: &'a [DeviceRecord], search: Option<&str>) -> Vec<&'a DeviceRecord> {
    let needle = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
    records
        .iter()
        .filter(|record| {
            needle.as_deref().map_or(true, |needle| {
                record.name.to_lowercase().contains(needle)
                    || record.address.to_lowercase().contains(needle)
                    || record.manufacturer.to_lowercase().contains(needle)
            })
        })
        .collect()
}

/// Stable sort of `records` by `key`.
pub fn sort_records(records: &mut [&DeviceRecord], key: SortKey) {
    match key {
        SortKey::Distance => records.sort_by_key(|r| r.proximity.rank_value),
        SortKey::Name => records.sort_by_cached_key(|r| r.name.to_lowercase()),
        SortKey::Rssi => records.sort_by_key(|r| std::cmp::Reverse(r.signal_strength)),
    }
}

/// Immutable copy of the registry published to readers after each tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryView {
    /// Last completed tick, 0 before the first.
    pub tick: u64,
    /// Time of the last tick.
    pub updated_at: Option<DateTime<Utc>>,
    /// Live devices in address order.
    pub devices: Vec<DeviceRecord>,
    /// Size of the ever-seen set.
    pub ever_seen_count: usize,
    /// Raw signal distribution of the live devices.
    pub histogram: Vec<HistogramBin>,
    /// Active counts of the most recent ticks, oldest first.
    pub timeline: Vec<TimelinePoint>,
    /// Whether the last fetch succeeded.
    pub feed_available: bool,
    histories: BTreeMap<String, Vec<HistoryEntry>>,
}

impl RegistryView {
    /// Number of live devices.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.devices.len()
    }

    /// Full retained history of `address`, oldest first.
    #[must_use]
    pub fn history(&self, address: &str) -> Option<&[HistoryEntry]> {
        self.histories
            .get(&normalize_address(address))
            .map(Vec::as_slice)
    }

    /// Live devices filtered by `search` and ordered by `sort`.
    #[must_use]
    pub fn query(&self, search: Option<&str>, sort: SortKey) -> Vec<&DeviceRecord> {
        let mut records = filter_records(&self.devices, search);
        sort_records(&mut records, sort);
        records
    }
}

/// Owner of all per-address inference state.
#[derive(Debug)]
pub struct DeviceRegistry {
    smoother: SignalSmoother,
    history: HistoryStore,
    estimator: MovementEstimator,
    matcher: FingerprintMatcher,
    liveness: LivenessTracker,
    ever_seen: HashMap<String, DateTime<Utc>>,
    missing_ticks: HashMap<String, u32>,
    active: Vec<DeviceRecord>,
    timeline: VecDeque<TimelinePoint>,
    timeline_capacity: usize,
    purge_after_missing_ticks: u32,
    purge_stale_after_secs: Option<f64>,
    tick: u64,
    last_tick_at: Option<DateTime<Utc>>,
    feed_available: bool,
}

impl DeviceRegistry {
    /// Registry configured from `config`, including its extra fingerprint rules.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: &Config) -> Self {
        Self {
            smoother: SignalSmoother::new(config.smoothing),
            history: HistoryStore::new(config.history.capacity),
            estimator: MovementEstimator::new(config.movement),
            matcher: FingerprintMatcher::new(config.fingerprint.rules.iter().cloned()),
            liveness: LivenessTracker::new(config.liveness.timeout_secs),
            ever_seen: HashMap::new(),
            missing_ticks: HashMap::new(),
            active: Vec::new(),
            timeline: VecDeque::with_capacity(config.registry.timeline_capacity),
            timeline_capacity: config.registry.timeline_capacity.max(1),
            purge_after_missing_ticks: config.registry.purge_after_missing_ticks.max(1),
            purge_stale_after_secs: config.registry.purge_stale_after_secs.map(|s| s as f64),
            tick: 0,
            last_tick_at: None,
            feed_available: false,
        }
    }

    /// Process one snapshot taken at `now`.
    pub fn tick(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> TickReport {
        self.tick += 1;
        let now_secs = epoch_secs(now);
        let timestamp_ms = now.timestamp_millis();

        let mut active = Vec::new();
        let mut newly_seen = Vec::new();
        let mut purged = Vec::new();

        for observation in snapshot.iter() {
            let address = observation.address.as_str();

            if !self.ever_seen.contains_key(address) {
                self.ever_seen.insert(address.to_string(), now);
                info!(
                    address,
                    name = observation.display_name(),
                    manufacturer = observation.display_manufacturer(),
                    "New device seen"
                );
                newly_seen.push(address.to_string());
            }
            self.missing_ticks.remove(address);

            let age = age_secs(observation.last_seen_epoch_secs, now_secs);
            if self.purge_stale_after_secs.is_some_and(|limit| age > limit) {
                if self.purge(address) {
                    info!(address, age_secs = age, "Purged stale device state");
                    purged.push(address.to_string());
                }
                continue;
            }

            let record = self.process(observation, now_secs, timestamp_ms);
            if record.is_live {
                active.push(record);
            }
        }

        for address in self.advance_missing(snapshot) {
            info!(address = %address, "Purged state of device no longer reported");
            purged.push(address);
        }

        self.finish_tick(active, now, true);
        debug!(
            tick = self.tick,
            reported = snapshot.len(),
            active = self.active.len(),
            ever_seen = self.ever_seen.len(),
            tracked = self.smoother.len(),
            "Tick complete"
        );

        TickReport {
            tick: self.tick,
            at: now,
            active: self.active.clone(),
            ever_seen_count: self.ever_seen.len(),
            newly_seen,
            purged,
            feed_available: true,
        }
    }

    /// Tick without a snapshot because the fetch failed. Previously active
    /// records are re-checked for liveness; nothing else changes.
    pub fn tick_unavailable(&mut self, now: DateTime<Utc>) -> TickReport {
        self.tick += 1;
        let now_secs = epoch_secs(now);

        let active: Vec<DeviceRecord> = std::mem::take(&mut self.active)
            .into_iter()
            .filter_map(|mut record| {
                record.age_secs = age_secs(record.last_seen_epoch_secs, now_secs);
                record.is_live = self.liveness.is_live(record.last_seen_epoch_secs, now_secs);
                record.is_live.then_some(record)
            })
            .collect();

        self.finish_tick(active, now, false);
        debug!(
            tick = self.tick,
            active = self.active.len(),
            "Tick without feed data"
        );

        TickReport {
            tick: self.tick,
            at: now,
            active: self.active.clone(),
            ever_seen_count: self.ever_seen.len(),
            newly_seen: Vec::new(),
            purged: Vec::new(),
            feed_available: false,
        }
    }

    fn process(&mut self, observation: &RawObservation, now_secs: f64, timestamp_ms: i64) -> DeviceRecord {
        let address = observation.address.as_str();
        let raw = f64::from(observation.signal_strength);

        let smoothed = self.smoother.update(address, raw);
        self.history.append(address, raw, smoothed, timestamp_ms);
        let movement = self.estimator.estimate(&self.history, address);

        DeviceRecord {
            address: address.to_string(),
            name: observation.display_name().to_string(),
            manufacturer: observation.display_manufacturer().to_string(),
            vendor: observation.display_vendor().to_string(),
            model_hint: observation.model_hint.clone(),
            service_ids: observation.service_ids.clone(),
            service_vendors: service_vendors(observation.service_ids.iter().map(ServiceId::as_str)),
            signal_strength: observation.signal_strength,
            smoothed_signal: smoothed,
            proximity: classify(raw),
            movement,
            fingerprint: self.matcher.identify_observation(observation),
            last_seen_epoch_secs: observation.last_seen_epoch_secs,
            age_secs: age_secs(observation.last_seen_epoch_secs, now_secs),
            is_live: self
                .liveness
                .is_live(observation.last_seen_epoch_secs, now_secs),
            first_seen: self.ever_seen.get(address).copied().unwrap_or_default(),
        }
    }

    /// Bump the missing counter of every tracked address absent from
    /// `snapshot` and purge those over the limit.
    fn advance_missing(&mut self, snapshot: &Snapshot) -> Vec<String> {
        let absent: Vec<String> = self
            .history
            .addresses()
            .filter(|address| !snapshot.contains(address))
            .map(ToString::to_string)
            .collect();

        let mut purged = Vec::new();
        for address in absent {
            let missing = self.missing_ticks.entry(address.clone()).or_insert(0);
            *missing += 1;
            if *missing >= self.purge_after_missing_ticks && self.purge(&address) {
                purged.push(address);
            }
        }
        purged.sort();
        purged
    }

    fn purge(&mut self, address: &str) -> bool {
        self.missing_ticks.remove(address);
        let had_filter = self.smoother.remove(address);
        let had_history = self.history.remove(address);
        had_filter || had_history
    }

    fn finish_tick(&mut self, active: Vec<DeviceRecord>, now: DateTime<Utc>, feed_available: bool) {
        self.active = active;
        self.last_tick_at = Some(now);
        self.feed_available = feed_available;

        if self.timeline.len() == self.timeline_capacity {
            self.timeline.pop_front();
        }
        self.timeline.push_back(TimelinePoint {
            tick: self.tick,
            at: now,
            active_count: self.active.len(),
        });
    }

    /// Immutable copy for readers.
    #[must_use]
    pub fn view(&self) -> RegistryView {
        RegistryView {
            tick: self.tick,
            updated_at: self.last_tick_at,
            devices: self.active.clone(),
            ever_seen_count: self.ever_seen.len(),
            histogram: histogram(self.active.iter().map(|r| f64::from(r.signal_strength))),
            timeline: self.timeline.iter().copied().collect(),
            feed_available: self.feed_available,
            histories: self
                .history
                .addresses()
                .filter_map(|address| {
                    self.history
                        .get(address)
                        .map(|buffer| (address.to_string(), buffer.to_vec()))
                })
                .collect(),
        }
    }

    /// Live devices as of the last tick.
    #[must_use]
    pub fn active(&self) -> &[DeviceRecord] {
        &self.active
    }

    /// Number of live devices as of the last tick.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of distinct addresses ever reported.
    #[must_use]
    pub fn ever_seen_count(&self) -> usize {
        self.ever_seen.len()
    }

    /// `true` if `address` was ever reported.
    #[must_use]
    pub fn has_seen(&self, address: &str) -> bool {
        self.ever_seen.contains_key(&normalize_address(address))
    }

    /// `true` if `address` currently has filter and history state.
    #[must_use]
    pub fn is_tracked(&self, address: &str) -> bool {
        let address = normalize_address(address);
        self.smoother.filter(&address).is_some()
    }

    /// Retained history of `address`, oldest first.
    #[must_use]
    pub fn history(&self, address: &str) -> Option<Vec<HistoryEntry>> {
        self.history
            .get(&normalize_address(address))
            .map(crate::history::HistoryBuffer::to_vec)
    }

    /// Active counts of the most recent ticks, oldest first.
    pub fn timeline(&self) -> impl Iterator<Item = &TimelinePoint> {
        self.timeline.iter()
    }

    /// Number of ticks processed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The fingerprint matcher in use.
    #[must_use]
    pub const fn matcher(&self) -> &FingerprintMatcher {
        &self.matcher
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
