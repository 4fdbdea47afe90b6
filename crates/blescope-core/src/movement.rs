//! Movement confidence from smoothed signal history.
//!
//! A stationary beacon produces a flat smoothed series with small, random
//! wobble. A beacon carried around produces spread, fast sample-to-sample
//! change, and a drift between the old and the new end of the window. Each of
//! the three is scaled and capped, then summed into a 0-100 score:
//!
//! | factor | scale | cap |
//! |---|---|---|
//! | standard deviation | x3 | 30 |
//! | mean absolute first difference | x4 | 40 |
//! | trend (recent mean vs. older mean) | x3 | 30 |
//!
//! Windows with `stdDev < 3` and `avgChange < 2` lose 20 points so ambient
//! multipath flicker does not register as motion.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::MovementConfig;
use crate::history::{HistoryBuffer, HistoryStore};

const STD_DEV_SCALE: f64 = 3.0;
const STD_DEV_CAP: f64 = 30.0;
const CHANGE_SCALE: f64 = 4.0;
const CHANGE_CAP: f64 = 40.0;
const TREND_SCALE: f64 = 3.0;
const TREND_CAP: f64 = 30.0;

const NOISE_FLOOR_STD_DEV: f64 = 3.0;
const NOISE_FLOOR_CHANGE: f64 = 2.0;
const NOISE_FLOOR_PENALTY: f64 = 20.0;

const FAST_CHANGE: f64 = 3.0;
const MEDIUM_CHANGE: f64 = 1.5;

/// Whether the signal is strengthening or weakening across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Recent samples are stronger than older ones.
    Approaching,
    /// Recent samples are as strong or weaker.
    Leaving,
}

/// Coarse rate-of-change bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Velocity {
    /// Mean change at most 1.5 dB per sample.
    Slow,
    /// Mean change above 1.5 and at most 3 dB per sample.
    Medium,
    /// Mean change above 3 dB per sample.
    Fast,
}

impl Velocity {
    fn from_avg_change(avg_change: f64) -> Self {
        if avg_change > FAST_CHANGE {
            Self::Fast
        } else if avg_change > MEDIUM_CHANGE {
            Self::Medium
        } else {
            Self::Slow
        }
    }
}

/// Movement descriptors for one device, recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MovementMetrics {
    /// Population variance of the window.
    pub variance: f64,
    /// Population standard deviation of the window.
    pub std_dev: f64,
    /// Mean absolute difference between consecutive samples.
    pub avg_change: f64,
    /// Absolute difference between the recent and the older mean.
    pub trend_delta: f64,
    /// Trend direction; absent below the minimum sample count.
    pub direction: Option<Direction>,
    /// Rate-of-change bucket; absent below the minimum sample count.
    pub velocity: Option<Velocity>,
    /// Movement confidence in `[0, 100]`.
    #[schema(minimum = 0, maximum = 100, example = 57)]
    pub score: u8,
    /// `score >= moving_threshold`.
    pub is_moving: bool,
    /// Samples the metrics were computed from.
    pub sample_count: usize,
}

impl MovementMetrics {
    /// All-zero result used when there is not enough history.
    #[must_use]
    pub const fn neutral(sample_count: usize) -> Self {
        Self {
            variance: 0.0,
            std_dev: 0.0,
            avg_change: 0.0,
            trend_delta: 0.0,
            direction: None,
            velocity: None,
            score: 0,
            is_moving: false,
            sample_count,
        }
    }
}

/// Derives [`MovementMetrics`] from a device's smoothed history.
#[derive(Debug, Clone, Copy)]
pub struct MovementEstimator {
    config: MovementConfig,
}

impl MovementEstimator {
    /// Create an estimator.
    #[must_use]
    pub const fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    /// Metrics for `address`, neutral if it has no history.
    #[must_use]
    pub fn estimate(&self, store: &HistoryStore, address: &str) -> MovementMetrics {
        store
            .get(address)
            .map_or(MovementMetrics::neutral(0), |buffer| self.estimate_buffer(buffer))
    }

    /// Metrics over the newest `window` smoothed values of `buffer`.
    #[must_use]
    pub fn estimate_buffer(&self, buffer: &HistoryBuffer) -> MovementMetrics {
        self.estimate_series(&buffer.smoothed_window(self.config.window))
    }

    /// Metrics over an explicit series, oldest first.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_series(&self, series: &[f64]) -> MovementMetrics {
        let n = series.len();
        if n < self.config.min_samples.max(2) {
            return MovementMetrics::neutral(n);
        }

        let window_mean = mean(series);
        let variance = series.iter().map(|v| (v - window_mean).powi(2)).sum::<f64>() / n as f64;
        let std_dev = variance.sqrt();

        let avg_change = series
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .sum::<f64>()
            / (n - 1) as f64;

        let k = self.config.trend_samples.clamp(1, n);
        let older_mean = mean(&series[..k]);
        let recent_mean = mean(&series[n - k..]);
        let trend_delta = (recent_mean - older_mean).abs();
        let direction = if recent_mean > older_mean {
            Direction::Approaching
        } else {
            Direction::Leaving
        };

        let mut raw = (std_dev * STD_DEV_SCALE).min(STD_DEV_CAP)
            + (avg_change * CHANGE_SCALE).min(CHANGE_CAP)
            + (trend_delta * TREND_SCALE).min(TREND_CAP);
        if std_dev < NOISE_FLOOR_STD_DEV && avg_change < NOISE_FLOOR_CHANGE {
            raw -= NOISE_FLOOR_PENALTY;
        }
        let score = score_from(raw);

        MovementMetrics {
            variance,
            std_dev,
            avg_change,
            trend_delta,
            direction: Some(direction),
            velocity: Some(Velocity::from_avg_change(avg_change)),
            score,
            is_moving: score >= self.config.moving_threshold,
            sample_count: n,
        }
    }
}

impl Default for MovementEstimator {
    fn default() -> Self {
        Self::new(MovementConfig::default())
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_from(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> MovementEstimator {
        MovementEstimator::default()
    }

    #[test]
    fn test_identical_values_score_zero() {
        let metrics = estimator().estimate_series(&[-60.0; 15]);
        assert_eq!(metrics.score, 0);
        assert!(metrics.std_dev.abs() < f64::EPSILON);
        assert!(metrics.avg_change.abs() < f64::EPSILON);
        assert!(!metrics.is_moving);
        assert_eq!(metrics.velocity, Some(Velocity::Slow));
    }

    #[test]
    fn test_below_min_samples_is_neutral() {
        let metrics = estimator().estimate_series(&[-40.0, -90.0]);
        assert_eq!(metrics, MovementMetrics::neutral(2));
        assert!(metrics.direction.is_none());
    }

    #[test]
    fn test_missing_address_is_neutral() {
        let store = HistoryStore::new(15);
        assert_eq!(estimator().estimate(&store, "AA"), MovementMetrics::neutral(0));
    }

    #[test]
    fn test_approaching_ramp() {
        // Steady 2 dB per sample strengthening.
        let series: Vec<f64> = (0..15).map(|i| -90.0 + 2.0 * f64::from(i)).collect();
        let metrics = estimator().estimate_series(&series);

        assert_eq!(metrics.direction, Some(Direction::Approaching));
        assert_eq!(metrics.velocity, Some(Velocity::Medium));
        assert!((metrics.avg_change - 2.0).abs() < 1e-9);
        assert!((metrics.variance - 224.0 / 3.0).abs() < 1e-9);
        // Trend: mean of last five minus mean of first five = 20 dB, capped at 30.
        assert!((metrics.trend_delta - 20.0).abs() < 1e-9);
        // sqrt(74.67)*3 + 2*4 + min(30, 60) = 25.9 + 8 + 30.
        assert_eq!(metrics.score, 64);
        assert!(metrics.is_moving);
    }

    #[test]
    fn test_leaving_ramp() {
        let series: Vec<f64> = (0..10).map(|i| -40.0 - 4.0 * f64::from(i)).collect();
        let metrics = estimator().estimate_series(&series);
        assert_eq!(metrics.direction, Some(Direction::Leaving));
        assert_eq!(metrics.velocity, Some(Velocity::Fast));
    }

    #[test]
    fn test_noise_floor_suppresses_flicker() {
        // +/-1 dB flicker around -70.
        let series: Vec<f64> = (0..15)
            .map(|i| if i % 2 == 0 { -69.5 } else { -70.5 })
            .collect();
        let metrics = estimator().estimate_series(&series);

        // Unsuppressed: 0.5*3 + 1*4 + ~0.1*3 ~= 6; minus 20 floors at zero.
        assert_eq!(metrics.score, 0);
        assert!(!metrics.is_moving);
    }

    #[test]
    fn test_score_is_capped_at_100() {
        let series: Vec<f64> = (0..15)
            .map(|i| if i < 8 { -95.0 } else { -30.0 })
            .collect();
        let metrics = estimator().estimate_series(&series);
        assert!(metrics.score <= 100);
        assert!(metrics.score >= 60);
    }

    #[test]
    fn test_score_always_in_range() {
        let mut seed: u32 = 7;
        for _ in 0..200 {
            let series: Vec<f64> = (0..15)
                .map(|_| {
                    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    -100.0 + f64::from(seed % 7000) / 100.0
                })
                .collect();
            let metrics = estimator().estimate_series(&series);
            assert!(metrics.score <= 100);
        }
    }

    #[test]
    fn test_window_uses_newest_entries() {
        let mut store = HistoryStore::new(30);
        // Twenty old samples of wild swings, then fifteen perfectly flat ones.
        for ts in 0..20 {
            let v = if ts % 2 == 0 { -40.0 } else { -90.0 };
            store.append("A", v, v, ts);
        }
        for ts in 20..35 {
            store.append("A", -60.0, -60.0, ts);
        }

        let metrics = estimator().estimate(&store, "A");
        assert_eq!(metrics.sample_count, 15);
        assert_eq!(metrics.score, 0);
    }
}
