//! Presence check against the last-seen timestamp.

use chrono::{DateTime, Utc};

/// `true` if `now - last_seen <= timeout`. All values are epoch seconds.
///
/// Timestamps in the future count as live.
#[must_use]
pub fn is_live(last_seen_epoch_secs: f64, now_epoch_secs: f64, timeout_secs: f64) -> bool {
    now_epoch_secs - last_seen_epoch_secs <= timeout_secs
}

/// Seconds elapsed since `last_seen`, never negative.
#[must_use]
pub fn age_secs(last_seen_epoch_secs: f64, now_epoch_secs: f64) -> f64 {
    (now_epoch_secs - last_seen_epoch_secs).max(0.0)
}

/// `now` as fractional epoch seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn epoch_secs(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64 / 1000.0
}

/// Applies a fixed timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessTracker {
    timeout_secs: f64,
}

impl LivenessTracker {
    /// Tracker with a timeout in whole seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs: timeout_secs as f64,
        }
    }

    /// See [`is_live`].
    #[must_use]
    pub fn is_live(&self, last_seen_epoch_secs: f64, now_epoch_secs: f64) -> bool {
        is_live(last_seen_epoch_secs, now_epoch_secs, self.timeout_secs)
    }

    /// Configured timeout.
    #[must_use]
    pub const fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new(60)
    }
}
