//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blescope_core::BlescopeError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 424 Failed Dependency - A required upstream feed is not configured.
    FailedDependency {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<String>,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to client in production).
        details: Option<String>,
    },

    /// 502/503/504 - An upstream feed failed. The status follows
    /// [`BlescopeError::http_status_code`].
    Upstream {
        /// 502 malformed payload, 503 unreachable, 504 timed out.
        status: StatusCode,
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "INVALID_ADDRESS",
    "message": "Invalid device address: 'xyz'. Expected format XX:XX:XX:XX:XX:XX.",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "INVALID_ADDRESS").
    #[schema(example = "INVALID_ADDRESS")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Invalid device address: 'xyz'. Expected format XX:XX:XX:XX:XX:XX.")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status this error is answered with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::FailedDependency { .. } => StatusCode::FAILED_DEPENDENCY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_response = match self {
            Self::BadRequest { error_code, message } | Self::NotFound { error_code, message } => {
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(|d| serde_json::json!(d)),
                }
            }

            Self::FailedDependency {
                error_code,
                message,
                details,
            }
            | Self::Upstream {
                error_code,
                message,
                details,
                ..
            } => ErrorResponse {
                error: error_code,
                message,
                details: details.map(|d| serde_json::json!(d)),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::FailedDependency { message, .. } => {
                write!(f, "Failed Dependency: {message}")
            }
            Self::InternalError { message, .. } => {
                write!(f, "Internal Error: {message}")
            }
            Self::Upstream { status, message, .. } => {
                write!(f, "Upstream Error ({}): {message}", status.as_u16())
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from blescope_core errors. The status is always the core's
/// [`BlescopeError::http_status_code`].
impl From<BlescopeError> for ApiError {
    fn from(err: BlescopeError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();
        let status =
            StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::BAD_GATEWAY);

        match err {
            BlescopeError::InvalidAddress(_) => Self::BadRequest {
                error_code,
                message,
            },
            BlescopeError::DeviceNotTracked(_) => Self::NotFound {
                error_code,
                message,
            },
            BlescopeError::FeedUnavailable(_)
            | BlescopeError::FeedTimeout { .. }
            | BlescopeError::MalformedPayload(_) => Self::Upstream {
                status,
                error_code,
                message,
                details: None,
            },
            BlescopeError::ConfigNotFound(_)
            | BlescopeError::ConfigParseError(_)
            | BlescopeError::ConfigValidationError(_)
            | BlescopeError::PersistenceError(_)
            | BlescopeError::IoError(_) => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

impl From<blescope_core::SourceError> for ApiError {
    fn from(err: blescope_core::SourceError) -> Self {
        Self::from(BlescopeError::from(err))
    }
}
