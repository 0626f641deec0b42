//! HTTP error responses

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use ipgate_core::GatewayError;
use thiserror::Error;

/// Body of the usage hint answered for anything that is not a gateway address
pub const USAGE_HINT: &str = "try /ipfs/<cid> or /ipns/<name>";

/// Body of the answer to unknown RPC API routes
pub const UNSUPPORTED_API: &str = "API + Method not supported";

/// Errors surfaced by gateway handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request does not carry a gateway address
    #[error("{0}")]
    Usage(String),

    /// Unknown RPC API route or method
    #[error("API + Method not supported")]
    Unsupported,

    /// An administrative operation (GC, version, health probe) failed
    #[error("{operation} failed: {message}")]
    Admin {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    /// Wrap the failure of an administrative operation
    pub fn admin(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Admin {
            operation,
            message: err.to_string(),
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Usage(_) => StatusCode::OK,
            Self::Unsupported => StatusCode::BAD_REQUEST,
            Self::Admin { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(GatewayError::InvalidAddress(_)) => StatusCode::OK,
            Self::Gateway(e) => e.status_code(),
        }
    }

    fn body(&self) -> String {
        match self {
            Self::Usage(_) | Self::Gateway(GatewayError::InvalidAddress(_)) => USAGE_HINT.to_string(),
            Self::Gateway(GatewayError::NotFound(_) | GatewayError::NoRootFound(_)) => {
                "not found".to_string()
            }
            Self::Gateway(GatewayError::Upstream { reason, .. }) => reason.clone(),
            Self::Admin { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Usage(detail) | Self::Gateway(GatewayError::InvalidAddress(detail)) => {
                tracing::debug!(detail = %detail, "not a gateway address, answering with usage hint");
            }
            Self::Admin { operation, message } => {
                tracing::error!(operation = %operation, error = %message, "administrative operation failed");
            }
            Self::Gateway(GatewayError::Cancelled) => {
                tracing::debug!("request cancelled before the response was sent");
            }
            _ => {}
        }

        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}
