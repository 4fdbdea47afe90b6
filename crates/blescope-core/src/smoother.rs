//! Scalar Kalman smoothing of signal strength.
//!
//! RSSI readings jump by several dB between advertisements even when nothing
//! moves. A one-dimensional Kalman filter with a constant-value model tracks
//! the underlying level: a low process noise trusts the running estimate, a
//! high measurement noise discounts individual samples.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::SmoothingConfig;

/// Filter state for a single address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanFilter {
    /// Current estimate, absent until the first sample arrives.
    estimate: Option<f64>,
    /// Error covariance `P`.
    error_covariance: f64,
    /// Process noise `Q`.
    process_noise: f64,
    /// Measurement noise `R`.
    measurement_noise: f64,
}

impl KalmanFilter {
    /// Create an uninitialised filter.
    #[must_use]
    pub const fn new(config: &SmoothingConfig) -> Self {
        Self {
            estimate: None,
            error_covariance: config.initial_error_covariance,
            process_noise: config.process_noise,
            measurement_noise: config.measurement_noise,
        }
    }

    /// Feed one raw sample and return the new estimate.
    ///
    /// The first sample seeds the estimate as-is and leaves the covariance
    /// untouched.
    pub fn update(&mut self, sample: f64) -> f64 {
        let Some(estimate) = self.estimate else {
            self.estimate = Some(sample);
            return sample;
        };

        let predicted = self.error_covariance + self.process_noise;
        let gain = predicted / (predicted + self.measurement_noise);
        let updated = gain.mul_add(sample - estimate, estimate);

        self.error_covariance = (1.0 - gain) * predicted;
        self.estimate = Some(updated);
        updated
    }

    /// Current estimate, if any sample has been seen.
    #[must_use]
    pub const fn estimate(&self) -> Option<f64> {
        self.estimate
    }

    /// Current error covariance.
    #[must_use]
    pub const fn error_covariance(&self) -> f64 {
        self.error_covariance
    }
}

/// Keeps one [`KalmanFilter`] per address, created lazily.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    config: SmoothingConfig,
    filters: HashMap<String, KalmanFilter>,
}

impl SignalSmoother {
    /// Create a smoother with the given tuning.
    #[must_use]
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            filters: HashMap::new(),
        }
    }

    /// Smooth one sample for `address`.
    pub fn update(&mut self, address: &str, sample: f64) -> f64 {
        if let Some(filter) = self.filters.get_mut(address) {
            return filter.update(sample);
        }
        let mut filter = KalmanFilter::new(&self.config);
        let smoothed = filter.update(sample);
        self.filters.insert(address.to_string(), filter);
        smoothed
    }

    /// Filter state for `address`.
    #[must_use]
    pub fn filter(&self, address: &str) -> Option<&KalmanFilter> {
        self.filters.get(address)
    }

    /// Drop the filter for `address`. Returns `true` if one existed.
    pub fn remove(&mut self, address: &str) -> bool {
        self.filters.remove(address).is_some()
    }

    /// Number of addresses with live filter state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// `true` if no filters exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for SignalSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_estimate() {
        let mut filter = KalmanFilter::new(&SmoothingConfig::default());
        assert!(filter.estimate().is_none());

        assert!((filter.update(-62.0) + 62.0).abs() < f64::EPSILON);
        assert!((filter.error_covariance() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_second_sample_moves_partially() {
        let mut filter = KalmanFilter::new(&SmoothingConfig::default());
        filter.update(-45.0);
        let smoothed = filter.update(-80.0);

        // P' = 1.008, K = 1.008 / 5.008
        let gain = 1.008 / 5.008;
        let expected = -45.0 + gain * -35.0;
        assert!((smoothed - expected).abs() < 1e-9);
        assert!(smoothed < -45.0 && smoothed > -80.0);
    }

    #[test]
    fn test_converges_on_constant_input() {
        let mut filter = KalmanFilter::new(&SmoothingConfig::default());
        filter.update(-90.0);

        let mut previous_covariance = filter.error_covariance();
        for _ in 0..500 {
            filter.update(-50.0);
            assert!(filter.error_covariance() <= previous_covariance + 1e-12);
            previous_covariance = filter.error_covariance();
        }
        let estimate = filter.estimate().unwrap();
        assert!((estimate + 50.0).abs() < 0.5, "estimate {estimate}");
    }

    #[test]
    fn test_covariance_non_increasing_from_smallest_valid_start() {
        let mut config = SmoothingConfig::default();
        config.initial_error_covariance = config.steady_state_covariance();
        let mut filter = KalmanFilter::new(&config);
        filter.update(-60.0);

        let mut previous_covariance = filter.error_covariance();
        for i in 0..200 {
            filter.update(if i % 2 == 0 { -55.0 } else { -65.0 });
            assert!(filter.error_covariance() <= previous_covariance + 1e-12);
            previous_covariance = filter.error_covariance();
        }
    }

    #[test]
    fn test_identical_samples_stay_put() {
        let mut filter = KalmanFilter::new(&SmoothingConfig::default());
        for _ in 0..20 {
            assert!((filter.update(-70.0) + 70.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoother_keeps_addresses_independent() {
        let mut smoother = SignalSmoother::default();
        smoother.update("A", -40.0);
        smoother.update("B", -90.0);
        let a = smoother.update("A", -40.0);
        let b = smoother.update("B", -90.0);

        assert!((a + 40.0).abs() < 1e-9);
        assert!((b + 90.0).abs() < 1e-9);
        assert_eq!(smoother.len(), 2);
    }

    #[test]
    fn test_remove_restarts_filter() {
        let mut smoother = SignalSmoother::default();
        smoother.update("A", -40.0);
        smoother.update("A", -40.0);
        assert!(smoother.remove("A"));
        assert!(!smoother.remove("A"));

        // Fresh filter: first sample is returned verbatim.
        assert!((smoother.update("A", -90.0) + 90.0).abs() < f64::EPSILON);
    }
}
