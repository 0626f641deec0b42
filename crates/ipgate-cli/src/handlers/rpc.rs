//! RPC API handlers (`/api/v0/...`)

use crate::{ApiError, AppState};
use axum::{extract::State, Json};
use ipgate_core::{with_timeout, ContentFetcher, FetchOptions, GatewayError, RedirectMode};
use ipgate_node::{ContentNode, NodeVersion};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Inline CID of "hello world\n"; fetching it needs no network or storage
pub const HEALTHCHECK_URI: &str = "ipfs://bafkqaddimvwgy3zao5xxe3debi";

/// GET|POST /api/v0/version - node version as `{Version, Commit}`
pub async fn version(State(state): State<Arc<AppState>>) -> Result<Json<NodeVersion>, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let version = state
        .version(&cancel)
        .await
        .map_err(|e| ApiError::admin("version", e))?;
    Ok(Json(version))
}

/// GET|POST /api/v0/repo/gc - garbage-collect the node repository
pub async fn gc(State(state): State<Arc<AppState>>) -> Result<&'static str, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let node = &state.node;

    info!(node = node.kind(), "running garbage collection");
    with_timeout(&cancel, state.config.gc_timeout(), |child| async move {
        node.gc(&child).await.map_err(GatewayError::from)
    })
    .await
    .map_err(|e| ApiError::admin("gc", e))?;

    Ok("OK")
}

/// GET /api/v0/http-gateway-healthcheck - fetch a well-known inline CID
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Result<&'static str, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let fetcher = &state.fetcher;

    let response = with_timeout(&cancel, state.config.healthcheck_timeout(), |child| async move {
        let options = FetchOptions::new(child).with_redirect(RedirectMode::Follow);
        fetcher.fetch(HEALTHCHECK_URI, options).await
    })
    .await
    .map_err(|e| ApiError::admin("healthcheck", e))?;

    if !response.is_success() {
        return Err(ApiError::admin(
            "healthcheck",
            format!("{} {}", response.status, response.reason),
        ));
    }

    debug!("healthcheck passed");
    Ok("OK")
}

/// Anything else under /api/v0
pub async fn unsupported() -> ApiError {
    ApiError::Unsupported
}
