//! Raw beacon observations as delivered by the data feed.
//!
//! The feed is a JSON object keyed by device address:
//!
//! ```json
//! { "AA:BB:CC:DD:EE:FF": { "rssi": -61, "name": "Pixel 8", "manuf": "Google",
//!                          "vendor": "Google, Inc.", "uuid": ["FE2C"],
//!                          "up_time": 1736912400.25 } }
//! ```
//!
//! Parsing is deliberately lenient per entry. A missing or mistyped field
//! falls back to its default (`rssi` -100, no name, no manufacturer, no
//! services, `up_time` 0) instead of failing the whole snapshot. Only a payload
//! that is not a JSON object at the top level is rejected.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::manufacturer::{normalize_manufacturer, UNKNOWN_MANUFACTURER};
use crate::source::SourceError;

/// Signal strength substituted when the feed omits `rssi`.
pub const DEFAULT_RSSI: i16 = -100;

/// Display name substituted when the feed omits `name`.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}([:-][0-9A-Fa-f]{2}){5}$").expect("address pattern is valid")
});

/// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`.
const BLUETOOTH_BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// A normalised GATT service identifier.
///
/// 16-bit ids are stored as four upper-case hex digits. 128-bit ids that sit on
/// the Bluetooth base UUID collapse to the same short form so `"180f"` and
/// `"0000180f-0000-1000-8000-00805f9b34fb"` compare equal. Vendor-specific
/// 128-bit ids keep their full upper-case hyphenated form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Parse and normalise a service id. Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.len() <= 8 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            // 32-bit ids with a zero upper half are 16-bit ids in disguise.
            let padded = format!("{trimmed:0>4}");
            let short = padded
                .strip_prefix("0000")
                .filter(|rest| rest.len() == 4)
                .unwrap_or(&padded);
            return Some(Self(short.to_ascii_uppercase()));
        }

        if let Ok(uuid) = uuid::Uuid::parse_str(trimmed) {
            let bytes = uuid.as_bytes();
            if bytes[0] == 0 && bytes[1] == 0 && bytes[4..] == BLUETOOTH_BASE_UUID[4..] {
                return Some(Self(format!("{:02X}{:02X}", bytes[2], bytes[3])));
            }
            return Some(Self(uuid.hyphenated().to_string().to_ascii_uppercase()));
        }

        Some(Self(trimmed.to_ascii_uppercase()))
    }

    /// The normalised form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when this id equals the given 16-bit short code (case-insensitive).
    #[must_use]
    pub fn is(&self, short: &str) -> bool {
        self.0.eq_ignore_ascii_case(short)
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One device as reported by the feed for a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Upper-case device address.
    pub address: String,
    /// Received signal strength in dBm.
    pub signal_strength: i16,
    /// Advertised local name.
    pub advertised_name: Option<String>,
    /// Company resolved from the manufacturer data, normalised.
    pub manufacturer: Option<String>,
    /// Device class decoded from the manufacturer payload.
    pub model_hint: Option<String>,
    /// Vendor resolved from the address OUI.
    pub vendor: Option<String>,
    /// Advertised services, normalised and de-duplicated.
    pub service_ids: Vec<ServiceId>,
    /// When the scanner last heard the device, in epoch seconds.
    pub last_seen_epoch_secs: f64,
}

impl RawObservation {
    /// Build an observation from one feed entry, substituting defaults for
    /// anything missing or of the wrong type.
    #[must_use]
    pub fn from_entry(address: &str, entry: &Value) -> Self {
        let signal_strength = entry
            .get("rssi")
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map_or(DEFAULT_RSSI, clamp_rssi);

        let advertised_name = text_field(entry, "name");
        let manufacturer = text_field(entry, "manuf").map(|m| normalize_manufacturer(&m));
        let vendor = text_field(entry, "vendor").and_then(|v| normalize_manufacturer(&v).name);

        let mut service_ids: Vec<ServiceId> = match entry.get("uuid") {
            Some(Value::String(s)) => ServiceId::parse(s).into_iter().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(ServiceId::parse)
                .collect(),
            _ => Vec::new(),
        };
        service_ids.sort();
        service_ids.dedup();

        let last_seen_epoch_secs = entry
            .get("up_time")
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);

        let (manufacturer, model_hint) =
            manufacturer.map_or((None, None), |m| (m.name, m.model_hint));

        Self {
            address: normalize_address(address),
            signal_strength,
            advertised_name,
            manufacturer,
            model_hint,
            vendor,
            service_ids,
            last_seen_epoch_secs,
        }
    }

    /// Advertised name, or `"Unknown Device"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.advertised_name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }

    /// Manufacturer, falling back to vendor, then `"Unknown"`.
    #[must_use]
    pub fn display_manufacturer(&self) -> &str {
        self.manufacturer
            .as_deref()
            .or(self.vendor.as_deref())
            .unwrap_or(UNKNOWN_MANUFACTURER)
    }

    /// Vendor, or `"Unknown"`.
    #[must_use]
    pub fn display_vendor(&self) -> &str {
        self.vendor.as_deref().unwrap_or(UNKNOWN_MANUFACTURER)
    }
}

/// Everything the feed reported in one fetch, keyed by address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    observations: BTreeMap<String, RawObservation>,
}

impl Snapshot {
    /// An empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a decoded feed payload.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the payload is not a JSON object.
    pub fn from_json_value(payload: &Value) -> Result<Self, SourceError> {
        let map = payload.as_object().ok_or_else(|| SourceError::Malformed {
            message: format!("expected a JSON object, got {}", json_kind(payload)),
        })?;

        Ok(map
            .iter()
            .filter(|(address, _)| !address.trim().is_empty())
            .map(|(address, entry)| RawObservation::from_entry(address, entry))
            .collect())
    }

    /// Parse a raw feed body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the body is not JSON or not an object.
    pub fn from_json_str(body: &str) -> Result<Self, SourceError> {
        let payload: Value = serde_json::from_str(body).map_err(|e| SourceError::Malformed {
            message: e.to_string(),
        })?;
        Self::from_json_value(&payload)
    }

    /// Add or replace an observation.
    pub fn insert(&mut self, observation: RawObservation) {
        self.observations
            .insert(observation.address.clone(), observation);
    }

    /// Look up an observation by (normalised) address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&RawObservation> {
        self.observations.get(&normalize_address(address))
    }

    /// `true` if the feed reported this address.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.observations.contains_key(&normalize_address(address))
    }

    /// Observations in address order.
    pub fn iter(&self) -> impl Iterator<Item = &RawObservation> {
        self.observations.values()
    }

    /// Number of reported devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl FromIterator<RawObservation> for Snapshot {
    fn from_iter<I: IntoIterator<Item = RawObservation>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        for observation in iter {
            snapshot.insert(observation);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = RawObservation;
    type IntoIter = std::collections::btree_map::IntoValues<String, RawObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.into_values()
    }
}

/// Canonical form of a device address: trimmed, upper-cased and
/// colon-separated.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase().replace('-', ":")
}

/// `true` for a six-octet hardware address such as `AA:BB:CC:DD:EE:FF`.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address.trim())
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_rssi(value: f64) -> i16 {
    value
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn text_field(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
