//! Application configuration management.
//!
//! Handles loading, saving, and validating blescope configuration including:
//! - Kalman smoothing tuning
//! - History capacity and movement window
//! - Liveness timeout and state eviction policy
//! - Observation feed endpoints and polling cadence
//! - HTTP server binding and logging mode
//! - Additional fingerprint rules
//!
//! Configuration is read from a TOML file and layered with environment
//! variables of the form `BLESCOPE__<SECTION>__<KEY>` (for example
//! `BLESCOPE__FEED__URL`). A missing file yields defaults.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::FingerprintRule;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BLESCOPE";

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file exists at the requested path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration sources could not be merged or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field failed validation.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// Explanation of the constraint.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration fields are invalid", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kalman filter tuning.
    pub smoothing: SmoothingConfig,
    /// Per-address history buffer.
    pub history: HistoryConfig,
    /// Movement estimation.
    pub movement: MovementConfig,
    /// Presence detection.
    pub liveness: LivenessConfig,
    /// Registry bookkeeping and eviction.
    pub registry: RegistryConfig,
    /// Observation feed endpoints.
    pub feed: FeedConfig,
    /// HTTP server binding.
    pub server: ServerConfig,
    /// Logging mode.
    pub logging: LoggingConfig,
    /// User-supplied fingerprint rules.
    pub fingerprint: FingerprintConfig,
}

/// Scalar Kalman filter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Process noise `Q`. Low values trust the running estimate.
    pub process_noise: f64,
    /// Measurement noise `R`. High values treat samples as noisy.
    pub measurement_noise: f64,
    /// Error covariance `P` assigned when a filter is created.
    ///
    /// Must be at least [`SmoothingConfig::steady_state_covariance`]; below
    /// it the covariance grows towards the fixed point instead of shrinking.
    pub initial_error_covariance: f64,
}

impl SmoothingConfig {
    /// Fixed point of the covariance update `P = (P + Q) R / (P + Q + R)`,
    /// about 0.175 for the defaults.
    #[must_use]
    pub fn steady_state_covariance(&self) -> f64 {
        let q = self.process_noise;
        let r = self.measurement_noise;
        (q.mul_add(q, 4.0 * q * r).sqrt() - q) / 2.0
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.008,
            measurement_noise: 4.0,
            initial_error_covariance: 1.0,
        }
    }
}

/// History buffer sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum entries retained per address.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 15 }
    }
}

/// Movement estimator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Number of most recent smoothed samples considered.
    pub window: usize,
    /// Samples required before any score is produced.
    pub min_samples: usize,
    /// Samples averaged at each end of the window for the trend.
    pub trend_samples: usize,
    /// Score at or above which a device is reported as moving.
    pub moving_threshold: u8,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            window: 15,
            min_samples: 3,
            trend_samples: 5,
            moving_threshold: 40,
        }
    }
}

/// Liveness tracker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Maximum age of the last observation for a device to count as present.
    pub timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Registry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of ticks kept in the active-count timeline.
    pub timeline_capacity: usize,
    /// Consecutive snapshots an address may be missing before its state is purged.
    pub purge_after_missing_ticks: u32,
    /// Purge state of addresses that stay stale longer than this. Unset keeps it.
    pub purge_stale_after_secs: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeline_capacity: 60,
            purge_after_missing_ticks: 1,
            purge_stale_after_secs: None,
        }
    }
}

/// Observation feed endpoints and cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// URL returning the live `address -> observation` mapping.
    pub url: String,
    /// URL returning the cumulative wardriving dataset. Unset disables polling.
    pub wardriving_url: Option<String>,
    /// Delay between registry ticks.
    pub poll_interval_ms: u64,
    /// Upper bound on a single fetch.
    pub fetch_timeout_ms: u64,
    /// Delay between wardriving dataset refreshes.
    pub wardriving_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/api/devices".to_string(),
            wardriving_url: None,
            poll_interval_ms: 1000,
            fetch_timeout_ms: 5000,
            wardriving_interval_ms: 10_000,
        }
    }
}

impl FeedConfig {
    /// Tick period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Wardriving refresh period.
    #[must_use]
    pub const fn wardriving_interval(&self) -> Duration {
        Duration::from_millis(self.wardriving_interval_ms)
    }
}

/// HTTP server binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_address: IpAddr,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

/// Logging mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON rolling files plus compact stdout instead of pretty stdout.
    pub production: bool,
}

/// Extra fingerprint rules merged into the built-in catalogue by priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Additional rules.
    pub rules: Vec<FingerprintRule>,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. Environment overrides are applied in both cases.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::build(path.as_ref(), false)
    }

    /// Load configuration from `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, otherwise the
    /// same errors as [`Config::load_or_default`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(path, true)
    }

    fn build(path: &Path, required: bool) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every field and report all violations at once.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::ValidationError {
                    field: field.to_string(),
                    message: message.to_string(),
                });
            }
        };

        let s = &self.smoothing;
        check(
            s.process_noise.is_finite() && s.process_noise > 0.0,
            "smoothing.process_noise",
            "must be a positive number",
        );
        check(
            s.measurement_noise.is_finite() && s.measurement_noise > 0.0,
            "smoothing.measurement_noise",
            "must be a positive number",
        );
        let noise_ok = s.process_noise.is_finite()
            && s.process_noise > 0.0
            && s.measurement_noise.is_finite()
            && s.measurement_noise > 0.0;
        check(
            s.initial_error_covariance.is_finite()
                && (!noise_ok || s.initial_error_covariance >= s.steady_state_covariance()),
            "smoothing.initial_error_covariance",
            "must be at least the steady-state covariance for process_noise and measurement_noise",
        );

        check(self.history.capacity >= 2, "history.capacity", "must be at least 2");

        let m = &self.movement;
        check(m.window >= 2, "movement.window", "must be at least 2");
        check(
            m.window <= self.history.capacity,
            "movement.window",
            "cannot exceed history.capacity",
        );
        check(m.min_samples >= 2, "movement.min_samples", "must be at least 2");
        check(m.trend_samples >= 1, "movement.trend_samples", "must be at least 1");
        check(
            m.moving_threshold <= 100,
            "movement.moving_threshold",
            "must be between 0 and 100",
        );

        check(self.liveness.timeout_secs > 0, "liveness.timeout_secs", "must be positive");

        let r = &self.registry;
        check(
            r.timeline_capacity >= 1,
            "registry.timeline_capacity",
            "must be at least 1",
        );
        check(
            r.purge_after_missing_ticks >= 1,
            "registry.purge_after_missing_ticks",
            "must be at least 1",
        );

        let f = &self.feed;
        check(is_http_url(&f.url), "feed.url", "must be an http(s) URL");
        if let Some(url) = &f.wardriving_url {
            check(is_http_url(url), "feed.wardriving_url", "must be an http(s) URL");
        }
        check(f.poll_interval_ms > 0, "feed.poll_interval_ms", "must be positive");
        check(f.fetch_timeout_ms > 0, "feed.fetch_timeout_ms", "must be positive");
        check(
            f.wardriving_interval_ms > 0,
            "feed.wardriving_interval_ms",
            "must be positive",
        );

        for (i, rule) in self.fingerprint.rules.iter().enumerate() {
            check(
                !rule.device_type.trim().is_empty(),
                &format!("fingerprint.rules[{i}].device_type"),
                "cannot be empty",
            );
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Returns the default configuration file path for the current platform.
///
/// On Linux: `/etc/blescope/config.toml`
/// Elsewhere: the platform config directory for `blescope`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/blescope/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "blescope").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!((config.smoothing.process_noise - 0.008).abs() < f64::EPSILON);
        assert!((config.smoothing.measurement_noise - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.history.capacity, 15);
        assert_eq!(config.liveness.timeout_secs, 60);
        assert_eq!(config.registry.timeline_capacity, 60);
        assert_eq!(config.feed.poll_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_single_validation_error() {
        let mut config = Config::default();
        config.liveness.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "liveness.timeout_secs");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_steady_state_covariance() {
        let smoothing = SmoothingConfig::default();
        let p = smoothing.steady_state_covariance();
        assert!((p - 0.174_93).abs() < 1e-4, "steady state {p}");

        let (q, r) = (smoothing.process_noise, smoothing.measurement_noise);
        assert!(((p + q) * r / (p + q + r) - p).abs() < 1e-12);
    }

    #[test]
    fn test_initial_covariance_below_steady_state_rejected() {
        let mut config = Config::default();
        config.smoothing.initial_error_covariance = 0.1;
        assert!(config.validate().is_err());

        config.smoothing.initial_error_covariance = 0.0;
        assert!(config.validate().is_err());

        config.smoothing.initial_error_covariance = config.smoothing.steady_state_covariance();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multiple_validation_errors_are_collected() {
        let mut config = Config::default();
        config.smoothing.measurement_noise = -1.0;
        config.movement.window = 40;
        config.feed.url = "ftp://example.com/feed".to_string();
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::MultipleValidationErrors(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn test_strict_load_requires_file() {
        let dir = tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[history]\ncapacity = 30\n\n[liveness]\ntimeout_secs = 90\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.history.capacity, 30);
        assert_eq!(config.liveness.timeout_secs, 90);
        assert_eq!(config.movement, MovementConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.feed.url = "http://10.0.0.2:8000/api/devices".to_string();
        config.registry.purge_stale_after_secs = Some(600);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.feed.url, config.feed.url);
        assert_eq!(loaded.registry.purge_stale_after_secs, Some(600));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\ncapacity = 1\n[movement]\nwindow = 1\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MultipleValidationErrors(_)));
    }

    #[test]
    fn test_default_config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
