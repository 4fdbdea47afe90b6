//! Unified error types for the blescope core library.
//!
//! This module provides a unified error type [`BlescopeError`] that covers every
//! failure mode surfaced by the core. Each module keeps its own specific error
//! type ([`ConfigError`](crate::config::ConfigError),
//! [`SourceError`](crate::source::SourceError)) for internal use.
//!
//! Note that the signal inference path itself never fails: smoothing, movement
//! estimation, proximity classification and fingerprinting always produce a
//! value. Errors only arise at the edges (configuration, data feed, wardriving
//! dataset parsing).
//!
//! # Example
//!
//! ```rust
//! use blescope_core::error::{BlescopeError, Result};
//! use std::path::PathBuf;
//!
//! fn require_config(path: &PathBuf) -> Result<()> {
//!     if !path.exists() {
//!         return Err(BlescopeError::ConfigNotFound(path.clone()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all blescope operations.
#[derive(Debug, Error)]
pub enum BlescopeError {
    // =========================================================================
    // DATA FEED ERRORS
    // =========================================================================
    /// The observation feed could not be reached.
    #[error("Observation feed unavailable: {0}")]
    FeedUnavailable(String),

    /// The feed answered but did not finish within the fetch timeout.
    #[error("Observation feed timed out after {timeout_ms} ms")]
    FeedTimeout {
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The feed answered with a payload that is not a JSON object.
    #[error("Malformed observation payload: {0}")]
    MalformedPayload(String),

    // =========================================================================
    // LOOKUP ERRORS
    // =========================================================================
    /// The requested device address has never been seen.
    #[error("Device not tracked: '{0}'")]
    DeviceNotTracked(String),

    /// The provided device address is not a valid MAC address.
    #[error("Invalid device address: '{0}'. Expected format XX:XX:XX:XX:XX:XX.")]
    InvalidAddress(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while reading or writing data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for blescope operations.
pub type Result<T> = std::result::Result<T, BlescopeError>;

impl BlescopeError {
    /// Returns `true` if this error comes from the observation feed.
    #[inline]
    #[must_use]
    pub const fn is_feed_error(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable(_) | Self::FeedTimeout { .. } | Self::MalformedPayload(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is likely to clear on the next tick.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable(_) | Self::FeedTimeout { .. } | Self::MalformedPayload(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    ///
    /// Configuration is the daemon's own, so its errors are server errors.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidAddress(_) => 400,
            Self::DeviceNotTracked(_) => 404,
            Self::ConfigNotFound(_)
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_)
            | Self::PersistenceError(_)
            | Self::IoError(_) => 500,
            Self::MalformedPayload(_) => 502,
            Self::FeedUnavailable(_) => 503,
            Self::FeedTimeout { .. } => 504,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::FeedUnavailable(_) => "FEED_UNAVAILABLE",
            Self::FeedTimeout { .. } => "FEED_TIMEOUT",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::DeviceNotTracked(_) => "DEVICE_NOT_TRACKED",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for BlescopeError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::source::SourceError> for BlescopeError {
    fn from(err: crate::source::SourceError) -> Self {
        use crate::source::SourceError;
        match err {
            SourceError::Unavailable { message } => Self::FeedUnavailable(message),
            SourceError::Timeout { timeout_ms } => Self::FeedTimeout { timeout_ms },
            SourceError::Malformed { message } => Self::MalformedPayload(message),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_feed_error_classification() {
        assert!(BlescopeError::FeedUnavailable("refused".into()).is_feed_error());
        assert!(BlescopeError::FeedTimeout { timeout_ms: 5000 }.is_feed_error());
        assert!(BlescopeError::MalformedPayload("not json".into()).is_feed_error());

        assert!(!BlescopeError::DeviceNotTracked("AA".into()).is_feed_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(BlescopeError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(BlescopeError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(BlescopeError::ConfigValidationError("bad".into()).is_config_error());

        assert!(!BlescopeError::FeedTimeout { timeout_ms: 1 }.is_config_error());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(BlescopeError::FeedUnavailable("down".into()).is_recoverable());
        assert!(BlescopeError::FeedTimeout { timeout_ms: 10 }.is_recoverable());
        assert!(!BlescopeError::ConfigParseError("x".into()).is_recoverable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            BlescopeError::InvalidAddress("zz".into()).http_status_code(),
            400
        );
        assert_eq!(
            BlescopeError::DeviceNotTracked("AA:BB:CC:DD:EE:FF".into()).http_status_code(),
            404
        );
        assert_eq!(
            BlescopeError::ConfigValidationError("x".into()).http_status_code(),
            500
        );
        assert_eq!(
            BlescopeError::MalformedPayload("x".into()).http_status_code(),
            502
        );
        assert_eq!(
            BlescopeError::FeedUnavailable("x".into()).http_status_code(),
            503
        );
        assert_eq!(
            BlescopeError::FeedTimeout { timeout_ms: 1 }.http_status_code(),
            504
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BlescopeError::FeedUnavailable("x".into()).error_code(),
            "FEED_UNAVAILABLE"
        );
        assert_eq!(
            BlescopeError::ConfigNotFound(PathBuf::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: BlescopeError = io_err.into();
        assert!(matches!(err, BlescopeError::IoError(_)));
    }

    #[test]
    fn test_from_source_error() {
        let err: BlescopeError = crate::source::SourceError::Timeout { timeout_ms: 250 }.into();
        assert!(matches!(err, BlescopeError::FeedTimeout { timeout_ms: 250 }));
        assert!(err.to_string().contains("250"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BlescopeError>();
        assert_sync::<BlescopeError>();
    }
}
