//! # Error Handling Module
//!
//! All failures the gateway can surface to a caller are modelled as one
//! `thiserror` enum with a fixed mapping to HTTP status codes. Routing and
//! authorization outcomes, the upstream failure translations from the
//! forwarding boundary, and data-access exhaustion all live here so that a
//! handler can end with `?` and let the `IntoResponse` impl produce the wire
//! shape.
//!
//! Two response shapes exist:
//! - every ordinary rejection returns a JSON body `{"detail": "<reason>"}`
//!   with the matching 4xx/5xx status;
//! - unexpected failures (`Internal`, `DataAccess`) return a plain-text
//!   `Internal Server Error` body with no internal detail. The detail is
//!   logged at the point the error is constructed, never echoed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error types for the API Gateway
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display`
/// with the given message; `status_code()` maps each variant to the status
/// the caller sees.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Fatal configuration problems at startup (bad config file, invalid
    /// values). Descriptor files are not in this category: a broken
    /// descriptor is skipped during onboarding, never fatal.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Service, version, or path not present in the routing table
    #[error("Not Found")]
    NotFound,

    /// Path matched a rule but the HTTP method has no configured policy
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Missing/invalid/expired token, or no group membership matched
    #[error("Unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// The matched policy denies all access, token or not
    #[error("Forbidden")]
    Forbidden,

    /// Upstream connection or payload transport failure
    #[error("Bad Gateway")]
    BadGateway,

    /// Upstream signalled overload
    #[error("Service Unavailable")]
    ServiceUnavailable,

    /// Upstream did not answer within the forwarding timeout
    #[error("Gateway Timeout")]
    GatewayTimeout,

    /// Pooled query retries exhausted; surfaces as a generic 500
    #[error("Data access failed: {detail} (request {request_id})")]
    DataAccess { detail: String, request_id: String },

    /// Unclassified failures; surfaces as a generic 500
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unauthorized error with a caller-visible detail
    pub fn unauthorized<S: Into<String>>(detail: S) -> Self {
        Self::Unauthorized {
            detail: detail.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code returned to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::DataAccess { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `detail` field of the JSON error body
    fn detail(&self) -> String {
        match self {
            Self::Unauthorized { detail } => detail.clone(),
            other => other
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {err}"),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal {
            message: format!("Database error: {err}"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            // Unexpected failures deliberately leak nothing: the detail was
            // already logged where the error was raised.
            Self::Internal { .. } | Self::DataAccess { .. } | Self::Config { .. } => {
                (status, "Internal Server Error").into_response()
            }
            other => (status, Json(json!({ "detail": other.detail() }))).into_response(),
        }
    }
}
