//! Error types for lead-assist.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors produced by the model gateway. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: Invalid origin")]
    Unauthorized,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("{provider} AI Service Offline. API key is not configured.")]
    ServiceUnavailable { provider: String },

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing message for any unexpected failure. Internals stay in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "An error occurred while processing your request.";

impl GatewayError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            // A provider that answers with a non-HTTP code still counts as a bad gateway.
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the response body.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// The `{ "error": { "code", "message" } }` body.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.status().as_u16(),
                "message": self.public_message(),
            }
        })
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref detail) = self {
            tracing::error!(error = %detail, "Error in AI proxy");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Errors seen by the client side when talking to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Gateway responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned no usable content: {0}")]
    EmptyUpstream(String),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl ChatError {
    /// Whether the gateway reported that the selected backend is not configured.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::Status { status: 503, .. })
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// A control directive that was present in model output but could not be used.
///
/// These never leave the parser as failures; they are reported alongside the
/// cleaned text so callers can log them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectiveError {
    #[error("Malformed chips directive: {0}")]
    MalformedChips(String),

    #[error("Malformed handoff directive: {0}")]
    MalformedHandoff(String),

    #[error("Handoff directive has no prefill")]
    MissingPrefill,

    #[error("Unterminated {0} directive")]
    Unterminated(&'static str),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
