//! Content handlers: path-style entries, subdomain requests and `/`

use crate::context::{is_subdomain_host, GatewayRequestContext};
use crate::stream::stream_response;
use crate::{ApiError, AppState};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use ipgate_core::{ContentFetcher, FetchOptions, RedirectDecision};
use std::sync::Arc;
use tracing::debug;

/// GET /{ipfs|ipns}/{address}[/path] - redirect to a subdomain origin or fetch
pub async fn path_entry(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if is_subdomain_host(&headers) {
        return subdomain(&state, uri.path(), headers).await;
    }

    let ctx = GatewayRequestContext::from_path(uri.path(), &headers)?;
    match state.redirects.decide(&ctx.parsed, &ctx.origin_host, &ctx.scheme, uri.query()) {
        RedirectDecision::Redirect(location) => Ok((
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, location)],
        )
            .into_response()),
        RedirectDecision::Continue => serve(&state, ctx, headers).await,
    }
}

/// GET / - usage hint, or content when the host is a content subdomain
pub async fn root(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if is_subdomain_host(&headers) {
        return subdomain(&state, uri.path(), headers).await;
    }
    Err(ApiError::Usage("no gateway address in request".to_string()))
}

/// Any other path - content on a content subdomain, usage hint otherwise
pub async fn fallback(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if is_subdomain_host(&headers) {
        return subdomain(&state, uri.path(), headers).await;
    }
    Err(ApiError::Usage(format!("'{}' is not a gateway path", uri.path())))
}

async fn subdomain(state: &AppState, path: &str, headers: HeaderMap) -> Result<Response, ApiError> {
    let ctx = GatewayRequestContext::from_subdomain(path, &headers)?;
    serve(state, ctx, headers).await
}

/// Fetch the request's content and stream it back
///
/// The request token is cancelled if this future is dropped (client gone)
/// before the response exists; afterwards the response body owns it.
async fn serve(
    state: &AppState,
    ctx: GatewayRequestContext,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let uri = ctx.fetch_uri();
    let guard = ctx.cancel.clone().drop_guard();

    debug!(uri = %uri, subdomain = ctx.is_subdomain_request, host = %ctx.origin_host, "fetching content");
    let options = FetchOptions::new(ctx.cancel.clone())
        .with_redirect(state.redirect_mode())
        .with_headers(headers);
    let upstream = state.fetcher.fetch(&uri, options).await?;

    Ok(stream_response(upstream, guard.disarm(), &uri))
}
