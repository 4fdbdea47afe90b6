//! Read-only view of the cumulative wardriving capture log.
//!
//! The scanner appends every address it hears for the first time to a JSON
//! object keyed by a running index:
//!
//! ```json
//! { "1": { "addr": "AA:BB:CC:DD:EE:FF", "rssi": -70, "name": false,
//!          "manuf": "Apple, Inc. | 12020003", "vendor": "N/A",
//!          "uuid": false, "up_time": 1736912400.0 } }
//! ```
//!
//! Nothing here feeds the registry. Entries can optionally be enriched with
//! the normalised manufacturer and a fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use crate::fingerprint::{FingerprintMatcher, FingerprintResult};
use crate::manufacturer::{normalize_manufacturer, service_vendors, NormalizedManufacturer, ServiceVendor};
use crate::observation::{RawObservation, ServiceId};
use crate::source::SourceError;

/// Derived identification attached on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Enrichment {
    /// Manufacturer split into company and payload hint.
    pub manufacturer: NormalizedManufacturer,
    /// Advertised services registered to a known vendor.
    pub service_vendors: Vec<ServiceVendor>,
    /// Identification.
    pub fingerprint: FingerprintResult,
}

/// One captured device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WardrivingEntry {
    /// Capture order, starting at 1.
    pub index: u64,
    /// Upper-case hardware address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,
    /// Advertised name.
    pub name: Option<String>,
    /// Manufacturer field exactly as captured.
    pub raw_manufacturer: Option<String>,
    /// OUI vendor.
    pub vendor: Option<String>,
    /// Signal strength at capture time, in dBm.
    pub signal_strength: i16,
    /// Advertised services.
    #[schema(value_type = Vec<String>)]
    pub service_ids: Vec<ServiceId>,
    /// Capture time in epoch seconds.
    pub last_seen_epoch_secs: f64,
    /// Present only when enrichment was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

impl WardrivingEntry {
    fn from_entry(index: u64, address: &str, entry: &Value) -> Self {
        let observation = RawObservation::from_entry(address, entry);
        let raw_manufacturer = entry
            .get("manuf")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        Self {
            index,
            address: observation.address,
            name: observation.advertised_name,
            raw_manufacturer,
            vendor: observation.vendor,
            signal_strength: observation.signal_strength,
            service_ids: observation.service_ids,
            last_seen_epoch_secs: observation.last_seen_epoch_secs,
            enrichment: None,
        }
    }

    fn to_observation(&self) -> RawObservation {
        let manufacturer = self
            .raw_manufacturer
            .as_deref()
            .map(normalize_manufacturer)
            .unwrap_or_default();
        RawObservation {
            address: self.address.clone(),
            signal_strength: self.signal_strength,
            advertised_name: self.name.clone(),
            manufacturer: manufacturer.name,
            model_hint: manufacturer.model_hint,
            vendor: self.vendor.clone(),
            service_ids: self.service_ids.clone(),
            last_seen_epoch_secs: self.last_seen_epoch_secs,
        }
    }

    /// Compute the enrichment for this entry.
    #[must_use]
    pub fn enrichment(&self, matcher: &FingerprintMatcher) -> Enrichment {
        let observation = self.to_observation();
        Enrichment {
            manufacturer: NormalizedManufacturer {
                name: observation.manufacturer.clone(),
                model_hint: observation.model_hint.clone(),
            },
            service_vendors: service_vendors(self.service_ids.iter().map(ServiceId::as_str)),
            fingerprint: matcher.identify_observation(&observation),
        }
    }
}

/// All captured devices, in capture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WardrivingDataset {
    entries: Vec<WardrivingEntry>,
}

impl WardrivingDataset {
    /// Parse a decoded capture log. Entries with a non-numeric key or without
    /// an `addr` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the payload is not a JSON object.
    pub fn from_json_value(payload: &Value) -> Result<Self, SourceError> {
        let map = payload.as_object().ok_or_else(|| SourceError::Malformed {
            message: "wardriving log is not a JSON object".to_string(),
        })?;

        let mut entries: Vec<WardrivingEntry> = map
            .iter()
            .filter_map(|(key, entry)| {
                let index = key.trim().parse::<u64>().ok();
                let address = entry
                    .get("addr")
                    .and_then(Value::as_str)
                    .filter(|a| !a.trim().is_empty());
                match (index, address) {
                    (Some(index), Some(address)) => Some(WardrivingEntry::from_entry(index, address, entry)),
                    _ => {
                        debug!(key = %key, "Skipping wardriving entry without index or address");
                        None
                    }
                }
            })
            .collect();
        entries.sort_by_key(|e| e.index);

        Ok(Self { entries })
    }

    /// Parse a raw capture log body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the body is not a JSON object.
    pub fn from_json_str(body: &str) -> Result<Self, SourceError> {
        let payload: Value = serde_json::from_str(body).map_err(|e| SourceError::Malformed {
            message: e.to_string(),
        })?;
        Self::from_json_value(&payload)
    }

    /// Entries in capture order.
    #[must_use]
    pub fn entries(&self) -> &[WardrivingEntry] {
        &self.entries
    }

    /// Copy of the dataset with every entry enriched.
    #[must_use]
    pub fn enriched(&self, matcher: &FingerprintMatcher) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|entry| WardrivingEntry {
                    enrichment: Some(entry.enrichment(matcher)),
                    ..entry.clone()
                })
                .collect(),
        }
    }

    /// Entries whose address, name or manufacturer contains `search`
    /// (case-insensitive).
    #[must_use]
    pub fn search(&self, search: &str) -> Vec<&WardrivingEntry> {
        let needle = search.trim().to_lowercase();
        let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
        self.entries
            .iter()
            .filter(|entry| {
                needle.is_empty()
                    || contains(Some(&entry.address))
                    || contains(entry.name.as_deref())
                    || contains(entry.raw_manufacturer.as_deref())
                    || contains(entry.vendor.as_deref())
            })
            .collect()
    }

    /// Number of captured devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"{
        "2": { "addr": "11:22:33:44:55:66", "rssi": -88, "name": false,
               "manuf": "Tile, Inc.", "vendor": false, "uuid": ["FE9F"], "up_time": 20.0 },
        "1": { "addr": "aa:bb:cc:dd:ee:ff", "rssi": -61, "name": "John's AirPods Pro",
               "manuf": "Apple, Inc. | 12020003", "vendor": "N/A",
               "uuid": ["0000180f-0000-1000-8000-00805f9b34fb"], "up_time": 10.0 },
        "x": { "addr": "99:99:99:99:99:99" },
        "3": { "rssi": -40 }
    }"#;

    #[test]
    fn test_parse_orders_by_index_and_skips_bad_entries() {
        let dataset = WardrivingDataset::from_json_str(LOG).unwrap();

        assert_eq!(dataset.len(), 2);
        let first = &dataset.entries()[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(first.raw_manufacturer.as_deref(), Some("Apple, Inc. | 12020003"));
        assert!(first.enrichment.is_none());
        assert_eq!(dataset.entries()[1].name, None);
    }

    #[test]
    fn test_enrichment() {
        let dataset = WardrivingDataset::from_json_str(LOG)
            .unwrap()
            .enriched(&FingerprintMatcher::default());

        let airpods = dataset.entries()[0].enrichment.as_ref().unwrap();
        assert_eq!(airpods.manufacturer.name.as_deref(), Some("Apple, Inc."));
        assert_eq!(
            airpods.manufacturer.model_hint.as_deref(),
            Some("Apple Audio Accessory (e.g. AirPods)")
        );
        assert_eq!(airpods.fingerprint.device_type, "AirPods Pro");

        let tile = dataset.entries()[1].enrichment.as_ref().unwrap();
        assert_eq!(tile.fingerprint.device_type, "Tile Tracker");
        assert_eq!(tile.service_vendors[0].vendor, "Tile");
    }

    #[test]
    fn test_search() {
        let dataset = WardrivingDataset::from_json_str(LOG).unwrap();
        assert_eq!(dataset.search("tile").len(), 1);
        assert_eq!(dataset.search("AA:BB").len(), 1);
        assert_eq!(dataset.search("").len(), 2);
        assert!(dataset.search("nokia").is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(WardrivingDataset::from_json_str("[]").is_err());
    }
}
