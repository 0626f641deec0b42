//! Error types for the ipgate-node crate

use http::StatusCode;
use ipgate_core::GatewayError;
use thiserror::Error;

/// Result type alias using `NodeError`
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur while talking to a content node
#[derive(Error, Debug)]
pub enum NodeError {
    /// Content or path not found
    #[error("not found: {0}")]
    NotFound(String),

    /// The node answered with an error
    #[error("node API error: {0}")]
    Api(String),

    /// The node could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// The node answered with something we could not decode
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid CID
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            NodeError::Connection(err.to_string())
        } else if err.is_decode() {
            NodeError::InvalidResponse(err.to_string())
        } else {
            NodeError::Api(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::InvalidResponse(err.to_string())
    }
}

impl From<cid::Error> for NodeError {
    fn from(err: cid::Error) -> Self {
        NodeError::InvalidCid(err.to_string())
    }
}

impl From<NodeError> for GatewayError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::NotFound(what) => GatewayError::NotFound(what),
            NodeError::Cancelled => GatewayError::Cancelled,
            NodeError::InvalidCid(msg) => GatewayError::InvalidAddress(msg),
            other => GatewayError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                reason: other.to_string(),
            },
        }
    }
}
