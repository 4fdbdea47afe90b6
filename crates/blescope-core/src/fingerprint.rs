//! Heuristic device identification.
//!
//! A [`FingerprintMatcher`] holds a list of [`FingerprintRule`]s sorted by
//! ascending priority. Each rule pairs a [`Condition`] over the device's
//! manufacturer, advertised name and service ids with the type, icon,
//! category and threat to report. The first rule whose condition holds wins,
//! so specific rules (AirPods Pro: name *and* battery service) carry a lower
//! priority number than the general ones (AirPods: name only).
//!
//! When no rule matches, the well-known GATT service classes decide
//! (heart rate / battery, audio, HID, environmental sensing). Failing that the
//! result is an explicit "Unknown Device".
//!
//! Rules are plain data and can be supplied from configuration:
//!
//! ```toml
//! [[fingerprint.rules]]
//! priority = 5
//! device_type = "Lab Beacon"
//! icon = "📡"
//! category = "sensor"
//! condition = { kind = "name_contains", value = "lab-" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::observation::{RawObservation, ServiceId, UNKNOWN_DEVICE_NAME};

/// Broad device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Headphones, earbuds and speakers.
    Audio,
    /// Item finders.
    Tracker,
    /// Watches, bands and rings.
    Wearable,
    /// Phones.
    Phone,
    /// Tablets.
    Tablet,
    /// Laptops and desktops.
    Computer,
    /// Assistants, doorbells and lights.
    SmartHome,
    /// Controllers and consoles.
    Gaming,
    /// Keyboards and mice.
    Peripheral,
    /// Cameras.
    Security,
    /// Environmental sensors.
    Sensor,
    /// Nothing matched.
    Unknown,
}

impl Category {
    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Tracker => "tracker",
            Self::Wearable => "wearable",
            Self::Phone => "phone",
            Self::Tablet => "tablet",
            Self::Computer => "computer",
            Self::SmartHome => "smart_home",
            Self::Gaming => "gaming",
            Self::Peripheral => "peripheral",
            Self::Security => "security",
            Self::Sensor => "sensor",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat attribute surfaced to consumers for visual warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Threat {
    /// No concern.
    #[default]
    None,
    /// Item trackers that could be planted on a person.
    PotentialTracking,
    /// Cameras and similar recording devices.
    Surveillance,
}

impl Threat {
    /// Severity and label to display, absent for [`Threat::None`].
    #[must_use]
    pub fn level(self) -> Option<ThreatLevel> {
        match self {
            Self::None => None,
            Self::PotentialTracking => Some(ThreatLevel {
                severity: Severity::Warning,
                label: "Tracking Device".to_string(),
            }),
            Self::Surveillance => Some(ThreatLevel {
                severity: Severity::Danger,
                label: "Surveillance Device".to_string(),
            }),
        }
    }

    /// `true` unless this is [`Threat::None`].
    #[must_use]
    pub const fn is_threat(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Display severity of a threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a look.
    Warning,
    /// Worth acting on.
    Danger,
}

/// Severity plus human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThreatLevel {
    /// Display severity.
    pub severity: Severity,
    /// Short label.
    #[schema(example = "Tracking Device")]
    pub label: String,
}

/// Predicate over a device's metadata.
///
/// Substring tests are case-insensitive. `name_equals` is exact, which lets a
/// rule target devices that advertise no name at all (`"Unknown Device"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Condition {
    /// Manufacturer contains `value`.
    ManufacturerContains { value: String },
    /// Name contains `value`.
    NameContains { value: String },
    /// Name is exactly `value`.
    NameEquals { value: String },
    /// A service id equals `value` after normalisation.
    HasService { value: String },
    /// Inverts `condition`.
    Not { condition: Box<Condition> },
    /// Every condition holds; vacuously true.
    All { conditions: Vec<Condition> },
    /// At least one condition holds.
    Any { conditions: Vec<Condition> },
}

impl Condition {
    /// Lower-case substring needles and normalise service ids once so that
    /// matching needs no allocation.
    fn normalized(self) -> Self {
        match self {
            Self::ManufacturerContains { value } => Self::ManufacturerContains {
                value: value.to_lowercase(),
            },
            Self::NameContains { value } => Self::NameContains {
                value: value.to_lowercase(),
            },
            Self::NameEquals { value } => Self::NameEquals { value },
            Self::HasService { value } => Self::HasService {
                value: ServiceId::parse(&value)
                    .map_or(value, |id| id.as_str().to_string()),
            },
            Self::Not { condition } => Self::Not {
                condition: Box::new(condition.normalized()),
            },
            Self::All { conditions } => Self::All {
                conditions: conditions.into_iter().map(Self::normalized).collect(),
            },
            Self::Any { conditions } => Self::Any {
                conditions: conditions.into_iter().map(Self::normalized).collect(),
            },
        }
    }

    fn matches(&self, facts: &Facts<'_>) -> bool {
        match self {
            Self::ManufacturerContains { value } => facts.manufacturer.contains(value.as_str()),
            Self::NameContains { value } => facts.name_lower.contains(value.as_str()),
            Self::NameEquals { value } => facts.name == value.as_str(),
            Self::HasService { value } => facts.services.iter().any(|s| s.is(value)),
            Self::Not { condition } => !condition.matches(facts),
            Self::All { conditions } => conditions.iter().all(|c| c.matches(facts)),
            Self::Any { conditions } => conditions.iter().any(|c| c.matches(facts)),
        }
    }
}

/// One identification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRule {
    /// Evaluation order, lowest first.
    pub priority: u32,
    /// Reported device type.
    pub device_type: String,
    /// Reported icon.
    pub icon: String,
    /// Reported category.
    pub category: Category,
    /// Reported threat, none unless given.
    #[serde(default)]
    pub threat: Threat,
    /// When the rule applies.
    pub condition: Condition,
}

impl FingerprintRule {
    fn result(&self) -> FingerprintResult {
        FingerprintResult::new(&self.device_type, &self.icon, self.category, self.threat)
    }
}

/// What a device was identified as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FingerprintResult {
    /// Human-readable type.
    #[schema(example = "AirPods Pro")]
    pub device_type: String,
    /// Emoji icon.
    #[schema(example = "🎧")]
    pub icon: String,
    /// Broad class.
    pub category: Category,
    /// Threat attribute.
    pub threat: Threat,
    /// Display severity derived from `threat`.
    pub threat_level: Option<ThreatLevel>,
}

impl FingerprintResult {
    fn new(device_type: &str, icon: &str, category: Category, threat: Threat) -> Self {
        Self {
            device_type: device_type.to_string(),
            icon: icon.to_string(),
            category,
            threat,
            threat_level: threat.level(),
        }
    }

    /// The explicit no-match result.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_DEVICE_NAME, "❓", Category::Unknown, Threat::None)
    }
}

/// Metadata a device is identified from.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTraits<'a> {
    /// Display name; `"Unknown Device"` when none was advertised.
    pub name: &'a str,
    /// Display manufacturer; `"Unknown"` when none was resolved.
    pub manufacturer: &'a str,
    /// Normalised advertised services.
    pub service_ids: &'a [ServiceId],
}

impl<'a> From<&'a RawObservation> for DeviceTraits<'a> {
    fn from(observation: &'a RawObservation) -> Self {
        Self {
            name: observation.display_name(),
            manufacturer: observation.display_manufacturer(),
            service_ids: &observation.service_ids,
        }
    }
}

struct Facts<'a> {
    name: &'a str,
    name_lower: String,
    manufacturer: String,
    services: &'a [ServiceId],
}

impl<'a> Facts<'a> {
    fn new(traits: DeviceTraits<'a>) -> Self {
        Self {
            name: traits.name,
            name_lower: traits.name.to_lowercase(),
            manufacturer: traits.manufacturer.to_lowercase(),
            services: traits.service_ids,
        }
    }
}

/// Ordered rule engine with a service-class fallback.
#[derive(Debug, Clone)]
pub struct FingerprintMatcher {
    rules: Vec<FingerprintRule>,
}

impl FingerprintMatcher {
    /// Built-in catalogue plus `extra` rules, merged by priority. On equal
    /// priority built-in rules are tried first.
    #[must_use]
    pub fn new(extra: impl IntoIterator<Item = FingerprintRule>) -> Self {
        let mut rules: Vec<FingerprintRule> = default_rules()
            .into_iter()
            .chain(extra)
            .map(|mut rule| {
                rule.condition = rule.condition.normalized();
                rule
            })
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        Self { rules }
    }

    /// Identify a device. Never fails.
    #[must_use]
    pub fn identify(&self, traits: DeviceTraits<'_>) -> FingerprintResult {
        let facts = Facts::new(traits);
        self.rules
            .iter()
            .find(|rule| rule.condition.matches(&facts))
            .map_or_else(|| identify_by_service(facts.services), FingerprintRule::result)
    }

    /// Identify a feed observation.
    #[must_use]
    pub fn identify_observation(&self, observation: &RawObservation) -> FingerprintResult {
        self.identify(DeviceTraits::from(observation))
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[FingerprintRule] {
        &self.rules
    }
}

impl Default for FingerprintMatcher {
    fn default() -> Self {
        Self::new([])
    }
}

fn identify_by_service(services: &[ServiceId]) -> FingerprintResult {
    let has = |short: &str| services.iter().any(|s| s.is(short));

    if has("180D") || has("180F") {
        FingerprintResult::new("Fitness Device", "💪", Category::Wearable, Threat::None)
    } else if has("110B") || has("110A") {
        FingerprintResult::new("Audio Device", "🔊", Category::Audio, Threat::None)
    } else if has("1812") {
        FingerprintResult::new("HID Device", "⌨️", Category::Peripheral, Threat::None)
    } else if has("181A") || has("181B") {
        FingerprintResult::new("Environmental Sensor", "🌡️", Category::Sensor, Threat::None)
    } else {
        FingerprintResult::unknown()
    }
}

fn manuf(value: &str) -> Condition {
    Condition::ManufacturerContains {
        value: value.to_string(),
    }
}

fn name(value: &str) -> Condition {
    Condition::NameContains {
        value: value.to_string(),
    }
}

fn service(value: &str) -> Condition {
    Condition::HasService {
        value: value.to_string(),
    }
}

fn all<const N: usize>(conditions: [Condition; N]) -> Condition {
    Condition::All {
        conditions: conditions.into(),
    }
}

fn any<const N: usize>(conditions: [Condition; N]) -> Condition {
    Condition::Any {
        conditions: conditions.into(),
    }
}

fn not(condition: Condition) -> Condition {
    Condition::Not {
        condition: Box::new(condition),
    }
}

fn rule(
    priority: u32,
    device_type: &str,
    icon: &str,
    category: Category,
    condition: Condition,
) -> FingerprintRule {
    FingerprintRule {
        priority,
        device_type: device_type.to_string(),
        icon: icon.to_string(),
        category,
        threat: Threat::None,
        condition,
    }
}

fn with_threat(mut rule: FingerprintRule, threat: Threat) -> FingerprintRule {
    rule.threat = threat;
    rule
}

/// The built-in catalogue, in evaluation order.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn default_rules() -> Vec<FingerprintRule> {
    use Category::{
        Audio, Computer, Gaming, Peripheral, Phone, Security, SmartHome, Tablet, Tracker, Wearable,
    };

    vec![
        // Apple
        rule(
            10,
            "AirPods Pro",
            "🎧",
            Audio,
            all([
                manuf("apple"),
                name("airpods"),
                any([service("180F"), service("180A")]),
            ]),
        ),
        rule(20, "AirPods", "🎧", Audio, all([manuf("apple"), name("airpods")])),
        with_threat(
            rule(
                30,
                "AirTag",
                "🏷️",
                Tracker,
                all([
                    manuf("apple"),
                    any([name("airtag"), service("FD44"), service("FEAA")]),
                ]),
            ),
            Threat::PotentialTracking,
        ),
        rule(40, "Apple Watch", "⌚", Wearable, all([manuf("apple"), name("watch")])),
        rule(
            50,
            "iPhone",
            "📱",
            Phone,
            all([
                manuf("apple"),
                any([
                    name("iphone"),
                    all([
                        Condition::NameEquals {
                            value: UNKNOWN_DEVICE_NAME.to_string(),
                        },
                        service("180D"),
                    ]),
                ]),
            ]),
        ),
        rule(60, "iPad", "📱", Tablet, all([manuf("apple"), name("ipad")])),
        rule(
            70,
            "MacBook",
            "💻",
            Computer,
            all([manuf("apple"), any([name("macbook"), name("mac")])]),
        ),
        // Trackers
        with_threat(
            rule(80, "Tile Tracker", "🏷️", Tracker, any([manuf("tile"), name("tile")])),
            Threat::PotentialTracking,
        ),
        with_threat(
            rule(90, "Samsung SmartTag", "🏷️", Tracker, all([manuf("samsung"), name("tag")])),
            Threat::PotentialTracking,
        ),
        // Fitness
        rule(100, "Fitbit", "⌚", Wearable, any([manuf("fitbit"), name("fitbit")])),
        rule(110, "Garmin Watch", "⌚", Wearable, any([manuf("garmin"), name("garmin")])),
        rule(
            120,
            "Mi Band",
            "⌚",
            Wearable,
            all([
                any([manuf("xiaomi"), manuf("huami")]),
                any([name("mi band"), name("amazfit")]),
            ]),
        ),
        // Audio
        rule(
            130,
            "Sony Headphones",
            "🎧",
            Audio,
            all([manuf("sony"), any([name("wh"), name("wf")])]),
        ),
        rule(140, "Bose Headphones", "🎧", Audio, any([manuf("bose"), name("bose")])),
        rule(150, "Samsung Buds", "🎧", Audio, all([manuf("samsung"), name("buds")])),
        rule(160, "JBL Speaker", "🔊", Audio, any([manuf("jbl"), name("jbl")])),
        // Smart home
        rule(
            170,
            "Google Home",
            "🏠",
            SmartHome,
            all([manuf("google"), any([name("home"), name("nest")])]),
        ),
        rule(180, "Amazon Echo", "🏠", SmartHome, any([manuf("amazon"), name("echo")])),
        rule(190, "Ring Doorbell", "🚪", SmartHome, name("ring")),
        rule(200, "Philips Hue", "💡", SmartHome, all([manuf("philips"), name("hue")])),
        // Gaming
        rule(
            210,
            "PlayStation Controller",
            "🎮",
            Gaming,
            all([
                manuf("sony"),
                any([
                    name("dualshock"),
                    name("dualsense"),
                    name("wireless controller"),
                ]),
            ]),
        ),
        rule(220, "Xbox Controller", "🎮", Gaming, all([manuf("microsoft"), name("xbox")])),
        rule(
            230,
            "Nintendo Switch",
            "🎮",
            Gaming,
            any([manuf("nintendo"), name("joy-con"), name("pro controller")]),
        ),
        // Peripherals
        rule(
            240,
            "Logitech Keyboard",
            "⌨️",
            Peripheral,
            all([manuf("logitech"), name("keyboard")]),
        ),
        rule(250, "Logitech Mouse", "🖱️", Peripheral, all([manuf("logitech"), name("mouse")])),
        rule(
            260,
            "Apple Magic Keyboard",
            "⌨️",
            Peripheral,
            all([manuf("apple"), name("keyboard")]),
        ),
        rule(270, "Apple Magic Mouse", "🖱️", Peripheral, all([manuf("apple"), name("mouse")])),
        // Phones
        rule(
            280,
            "Samsung Phone",
            "📱",
            Phone,
            all([manuf("samsung"), any([name("galaxy"), name("samsung")])]),
        ),
        rule(290, "Google Pixel", "📱", Phone, all([manuf("google"), name("pixel")])),
        // Surveillance
        with_threat(
            rule(300, "Hidden Camera", "📷", Security, any([name("camera"), name("cam")])),
            Threat::Surveillance,
        ),
        // Generic
        rule(
            310,
            "Bluetooth Headphones",
            "🎧",
            Audio,
            any([service("110B"), name("headphone"), name("earbuds")]),
        ),
        rule(
            320,
            "Smartwatch",
            "⌚",
            Wearable,
            all([name("watch"), not(manuf("apple"))]),
        ),
        rule(
            330,
            "Bluetooth Keyboard",
            "⌨️",
            Peripheral,
            all([service("1812"), name("keyboard")]),
        ),
    ]
}
