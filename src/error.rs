//! Error types for the feedback gateway
//!
//! Every failure the gateway itself originates is one [`Error`] variant. Each variant
//! maps to exactly one HTTP status and one stable public message, rendered as
//! `{"message": <string>}`. Downstream business errors (404, 400, 501 from the storage
//! service) are not errors here: the proxy passes them through as ordinary responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Unroutable path, unsupported method, or a body the gateway inspects is missing
    /// a required field
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A credential was presented but could not be decoded or its signature is wrong
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Protected route, no credential presented
    #[error("Authentication required")]
    AuthRequired,

    /// Credential signature is valid but it has expired
    #[error("Credential expired")]
    AuthExpired,

    /// Credential is valid but carries no administrator id
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Inbound body exceeds the configured limit
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Connection failure, DNS failure or timeout while reaching a downstream service
    #[error("Upstream {upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: String, reason: String },

    /// Startup configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status the caller sees for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::InvalidCredential(_) => StatusCode::BAD_REQUEST,
            Error::AuthRequired | Error::AuthExpired => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message rendered to the caller.
    ///
    /// Transport and internal details never leave the process; they are only logged.
    pub fn public_message(&self) -> String {
        match self {
            Error::BadRequest(msg) => msg.clone(),
            Error::InvalidCredential(_) => "Bad request: invalid credential".to_string(),
            Error::AuthRequired => "Please log in to proceed".to_string(),
            Error::AuthExpired => "Your credential has expired".to_string(),
            Error::Forbidden(msg) => msg.clone(),
            Error::PayloadTooLarge { .. } => "Payload too large".to_string(),
            Error::UpstreamUnavailable { .. } => "Bad Gateway".to_string(),
            Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Stable machine-readable code, used in logs and GraphQL error extensions
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::InvalidCredential(_) => "INVALID_CREDENTIAL",
            Error::AuthRequired => "AUTH_REQUIRED",
            Error::AuthExpired => "AUTH_EXPIRED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Error::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the `{"message": ...}` envelope
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.public_message(),
        }
    }
}

/// Error envelope for gateway-originated failures
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Gateway error");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
