//! Signal strength to distance zone, and the signal histogram.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Weakest bin of the histogram.
pub const HISTOGRAM_MIN: i32 = -100;
/// Strongest bin of the histogram.
pub const HISTOGRAM_MAX: i32 = -30;
/// Width of one histogram bin in dB.
pub const HISTOGRAM_BIN_WIDTH: i32 = 10;

const CLOSE_THRESHOLD: f64 = -50.0;
const MEDIUM_THRESHOLD: f64 = -70.0;

/// Coarse distance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// `s >= -50`, roughly within two metres.
    Close,
    /// `-70 <= s < -50`.
    Medium,
    /// `s < -70`.
    Far,
}

impl Zone {
    /// Bucket a signal strength.
    #[must_use]
    pub fn from_signal(signal: f64) -> Self {
        if signal >= CLOSE_THRESHOLD {
            Self::Close
        } else if signal >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Far
        }
    }

    /// Approximate range label.
    #[must_use]
    pub const fn range_label(self) -> &'static str {
        match self {
            Self::Close => "<2m",
            Self::Medium => "2-5m",
            Self::Far => ">5m",
        }
    }

    /// Representative distance used for sorting: 1, 3 or 6.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Close => 1,
            Self::Medium => 3,
            Self::Far => 6,
        }
    }
}

/// Zone, label and rank for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProximityResult {
    /// Distance bucket.
    pub zone: Zone,
    /// `<2m`, `2-5m` or `>5m`.
    #[schema(example = "2-5m")]
    pub approx_range_label: String,
    /// Sort key, nearer is smaller.
    #[schema(example = 3)]
    pub rank_value: u8,
}

/// Classify a signal strength sample.
#[must_use]
pub fn classify(signal: f64) -> ProximityResult {
    let zone = Zone::from_signal(signal);
    ProximityResult {
        zone,
        approx_range_label: zone.range_label().to_string(),
        rank_value: zone.rank(),
    }
}

/// Histogram bin key for `signal`: `floor(s / 10) * 10`, clamped to the
/// histogram range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bin_key(signal: f64) -> i32 {
    let width = f64::from(HISTOGRAM_BIN_WIDTH);
    let key = (signal / width).floor() * width;
    key.clamp(f64::from(HISTOGRAM_MIN), f64::from(HISTOGRAM_MAX)) as i32
}

/// One histogram bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistogramBin {
    /// Lower edge of the bin in dBm.
    #[schema(example = -60)]
    pub bin: i32,
    /// Samples in the bin.
    pub count: usize,
}

/// Count samples per 10 dB bin from -100 to -30. Every bin is present, empty
/// ones with a zero count, ordered weakest first.
pub fn histogram(signals: impl IntoIterator<Item = f64>) -> Vec<HistogramBin> {
    let mut bins: Vec<HistogramBin> = (HISTOGRAM_MIN..=HISTOGRAM_MAX)
        .step_by(HISTOGRAM_BIN_WIDTH.unsigned_abs() as usize)
        .map(|bin| HistogramBin { bin, count: 0 })
        .collect();

    for signal in signals.into_iter().filter(|s| !s.is_nan()) {
        let key = bin_key(signal);
        if let Some(slot) = bins.iter_mut().find(|b| b.bin == key) {
            slot.count += 1;
        }
    }
    bins
}
