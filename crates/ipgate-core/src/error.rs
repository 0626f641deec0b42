//! Error types for the ipgate-core crate

use http::StatusCode;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors produced while resolving and serving a gateway request
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Malformed path, host or URI
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Every resolution strategy was exhausted (or a negative cache entry hit)
    #[error("could not resolve name: {0}")]
    NameNotFound(String),

    /// None of the directory index candidates exist
    #[error("no root file found in directory {0}")]
    NoRootFound(String),

    /// The content was not found by the content node
    #[error("not found: {0}")]
    NotFound(String),

    /// A resolution strategy failed (network, decoding, ...)
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// The fetch collaborator failed or returned a non-success status
    #[error("upstream error ({status}): {reason}")]
    Upstream { status: StatusCode, reason: String },

    /// The body failed after the response head was sent
    #[error("streaming error: {0}")]
    Streaming(String),

    /// The request was cancelled (client went away)
    #[error("operation cancelled")]
    Cancelled,

    /// The operation exceeded its time bound
    #[error("operation timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl GatewayError {
    /// HTTP status a fetch collaborator answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            Self::NameNotFound(_) | Self::Resolution(_) => StatusCode::BAD_GATEWAY,
            Self::NoRootFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => *status,
            Self::Streaming(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // nginx-style "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether this error should be cached as a negative resolution
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Resolution(format!("request timed out: {}", err))
        } else {
            GatewayError::Resolution(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Resolution(format!("invalid response body: {}", err))
    }
}
