//! The content fetch seam
//!
//! The gateway does not fetch blocks itself. It hands `ipfs://` / `ipns://`
//! URIs to a [`ContentFetcher`] and streams whatever comes back.

use crate::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io;
use tokio_util::sync::CancellationToken;

/// Upstream body, read chunk by chunk
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// How directory requests without a trailing slash are answered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedirectMode {
    /// Answer with a redirect to the slash-terminated path
    #[default]
    Manual,
    /// Serve the directory index directly
    Follow,
}

/// Per-request fetch options
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub cancel: CancellationToken,
    pub redirect: RedirectMode,
    /// Request headers forwarded to the fetcher
    pub headers: HeaderMap,
}

impl FetchOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Default::default()
        }
    }

    pub fn with_redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// What a fetcher answers with
pub struct ContentResponse {
    pub status: StatusCode,
    /// Textual reason, used as the body of non-success responses
    pub reason: String,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl ContentResponse {
    /// Successful response streaming `body`
    pub fn ok(headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status: StatusCode::OK,
            reason: String::new(),
            headers,
            body,
        }
    }

    /// Bodiless response carrying a status and reason
    pub fn error(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: HeaderMap::new(),
            body: Box::pin(stream::empty()),
        }
    }

    /// Redirect to `location` with an empty body
    pub fn redirect(status: StatusCode, location: &str) -> Result<Self> {
        let mut response = Self::error(status, String::new());
        let value = location
            .parse()
            .map_err(|_| GatewayError::InvalidAddress(format!("bad redirect location '{}'", location)))?;
        response.headers.insert(http::header::LOCATION, value);
        Ok(response)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl From<GatewayError> for ContentResponse {
    fn from(err: GatewayError) -> Self {
        let reason = match &err {
            GatewayError::NotFound(_) | GatewayError::NoRootFound(_) => "not found".to_string(),
            GatewayError::Upstream { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self::error(err.status_code(), reason)
    }
}

impl fmt::Debug for ContentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Resolves a content URI to a response
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch `uri` (`ipfs://{cid}/path` or `ipns://{name}/path`)
    ///
    /// Content-level failures are reported in the returned status. `Err` is
    /// reserved for cancellation and failures of the fetcher itself.
    async fn fetch(&self, uri: &str, options: FetchOptions) -> Result<ContentResponse>;
}
