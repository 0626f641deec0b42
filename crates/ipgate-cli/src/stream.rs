//! Bridge from fetcher responses to HTTP responses

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use ipgate_core::{CancellableBody, ContentResponse};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cache directive for successful responses; content-addressed data never changes
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=29030400, immutable";

/// Turn a fetcher response into an HTTP response
///
/// Non-success responses carry the upstream status, headers and reason
/// text; their body is never read. Successful bodies are streamed chunk by
/// chunk and stop as soon as `cancel` fires. Dropping the returned response
/// (or finishing its body) cancels `cancel`.
pub fn stream_response(upstream: ContentResponse, cancel: CancellationToken, label: &str) -> Response {
    let ContentResponse {
        status,
        reason,
        headers,
        body,
    } = upstream;

    if !status.is_success() {
        debug!(path = %label, status = status.as_u16(), reason = %reason, "upstream answered without content");
        // the upstream body is dropped unread
        cancel.cancel();
        let mut response = (status, reason).into_response();
        extend_headers(&mut response, headers);
        return response;
    }

    let body = CancellableBody::new(body, cancel, label);
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    extend_headers(&mut response, headers);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL));
    response
}

/// Upstream values replace the response's own for each name; repeated headers keep every value
fn extend_headers(response: &mut Response, headers: axum::http::HeaderMap) {
    response.headers_mut().extend(headers);
}
