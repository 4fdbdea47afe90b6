//! Manufacturer normalisation and well-known service tables.
//!
//! The scanner that produces the feed resolves the advertised company
//! identifier to a name and appends the raw manufacturer payload, yielding
//! strings such as `"Apple, Inc. | 12020003"`. It also emits `"N/A"` or a
//! literal `false` when nothing was resolved. These helpers turn that into a
//! clean display name plus an optional model hint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placeholder used when neither manufacturer nor vendor is known.
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";

/// Apple continuity payload prefixes and the device class they announce.
const PAYLOAD_HINTS: &[(&str, &str)] = &[
    ("12020002", "Apple Watch (device class)"),
    ("12020003", "Apple Audio Accessory (e.g. AirPods)"),
    ("12020000", "Apple Setup Device (generic)"),
    ("10063b1d", "Apple Nearby/Continuity rotating ID"),
];

/// A manufacturer string split into its display name and payload hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedManufacturer {
    /// Company name, or `None` when the feed carried a placeholder.
    #[schema(example = "Apple, Inc.")]
    pub name: Option<String>,

    /// Device class decoded from the manufacturer payload, if recognised.
    #[schema(example = "Apple Audio Accessory (e.g. AirPods)")]
    pub model_hint: Option<String>,
}

/// Normalise a raw manufacturer field.
///
/// Empty strings, `"N/A"`, `"false"` and `"none"` count as absent. Anything after
/// the first `|` is treated as the payload and looked up in the continuity table.
#[must_use]
pub fn normalize_manufacturer(raw: &str) -> NormalizedManufacturer {
    let (company, payload) = match raw.split_once('|') {
        Some((company, payload)) => (company.trim(), Some(payload.trim())),
        None => (raw.trim(), None),
    };

    let name = if is_placeholder(company) {
        None
    } else {
        Some(company.to_string())
    };

    let model_hint = payload.and_then(|p| {
        let p = p.to_ascii_lowercase();
        PAYLOAD_HINTS
            .iter()
            .find(|(prefix, _)| p.starts_with(prefix))
            .map(|(_, hint)| (*hint).to_string())
    });

    NormalizedManufacturer { name, model_hint }
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty()
        || value.eq_ignore_ascii_case("n/a")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("none")
        || value.eq_ignore_ascii_case("null")
}

/// How likely a service id is to identify its vendor in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    /// Rarely seen in advertisements.
    Low,
    /// Seen on some products.
    Medium,
    /// Common in the product line.
    High,
    /// Ubiquitous across white-label products.
    VeryHigh,
}

/// A 16-bit member service UUID registered to a known vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnownService {
    /// Upper-case 16-bit short form.
    pub uuid: &'static str,
    /// Vendor or ecosystem.
    pub vendor: &'static str,
    /// What the service is used for.
    pub notes: &'static str,
    /// How reliable the mapping is.
    pub likelihood: Likelihood,
}

/// A known vendor service advertised by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceVendor {
    /// Upper-case 16-bit short form.
    #[schema(example = "FE9F")]
    pub uuid: String,
    /// Vendor or ecosystem.
    #[schema(example = "Tile")]
    pub vendor: String,
    /// How reliable the mapping is.
    pub likelihood: Likelihood,
}

impl From<&KnownService> for ServiceVendor {
    fn from(service: &KnownService) -> Self {
        Self {
            uuid: service.uuid.to_string(),
            vendor: service.vendor.to_string(),
            likelihood: service.likelihood,
        }
    }
}

const KNOWN_SERVICES: &[KnownService] = &[
    KnownService {
        uuid: "FD50",
        vendor: "Tuya",
        notes: "Smart locks, plugs, bulbs and scales sold under many brands",
        likelihood: Likelihood::VeryHigh,
    },
    KnownService {
        uuid: "FD21",
        vendor: "Xiaomi",
        notes: "Sensors and fitness trackers",
        likelihood: Likelihood::High,
    },
    KnownService {
        uuid: "FE95",
        vendor: "Xiaomi (MiBeacon)",
        notes: "Advertisement extension across the Xiaomi ecosystem",
        likelihood: Likelihood::High,
    },
    KnownService {
        uuid: "FD6F",
        vendor: "Fitbit",
        notes: "Fitness tracker sync and telemetry",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FE9F",
        vendor: "Tile",
        notes: "Encrypted location beacons",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FD88",
        vendor: "Oura Ring",
        notes: "Health data sync from biometric rings",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FDCF",
        vendor: "Amazon Echo Buds",
        notes: "Earbud telemetry and control",
        likelihood: Likelihood::Low,
    },
    KnownService {
        uuid: "FD19",
        vendor: "Garmin",
        notes: "Fitness watches and sensors",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FDC0",
        vendor: "Apple (Find My)",
        notes: "AirTags and Find My enabled accessories",
        likelihood: Likelihood::Low,
    },
    KnownService {
        uuid: "FEE0",
        vendor: "Samsung",
        notes: "Health device sync and watch pairing",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FD3D",
        vendor: "Nordic Semiconductor",
        notes: "DIY firmware, OTA and control",
        likelihood: Likelihood::High,
    },
    KnownService {
        uuid: "FDC1",
        vendor: "Withings",
        notes: "Smart scales, blood pressure monitors and watches",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FD12",
        vendor: "Anker Soundcore",
        notes: "Headphone settings, EQ and firmware",
        likelihood: Likelihood::Medium,
    },
    KnownService {
        uuid: "FDAF",
        vendor: "Google (Fast Pair)",
        notes: "Android Fast Pair handshake",
        likelihood: Likelihood::Low,
    },
];

/// Look up a normalised 16-bit service id.
#[must_use]
pub fn lookup_service(short_id: &str) -> Option<&'static KnownService> {
    KNOWN_SERVICES
        .iter()
        .find(|s| s.uuid.eq_ignore_ascii_case(short_id))
}

/// Known vendors among `service_ids`, in the order given.
pub fn service_vendors<'a>(service_ids: impl IntoIterator<Item = &'a str>) -> Vec<ServiceVendor> {
    service_ids
        .into_iter()
        .filter_map(lookup_service)
        .map(ServiceVendor::from)
        .collect()
}

/// The full table of known vendor services.
#[must_use]
pub const fn known_services() -> &'static [KnownService] {
    KNOWN_SERVICES
}
