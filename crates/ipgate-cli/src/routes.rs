//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the gateway router, with the RPC API nested under `/api/v0`
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        // Path-style entries; `{*path}` needs a non-empty tail
        .route("/ipfs/{address}", get(handlers::path_entry))
        .route("/ipfs/{address}/", get(handlers::path_entry))
        .route("/ipfs/{address}/{*path}", get(handlers::path_entry))
        .route("/ipns/{address}", get(handlers::path_entry))
        .route("/ipns/{address}/", get(handlers::path_entry))
        .route("/ipns/{address}/{*path}", get(handlers::path_entry))
        .route("/", get(handlers::root))
        .nest("/api/v0", rpc_routes())
        // Subdomain requests and everything else
        .fallback(handlers::fallback)
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::logging_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Create a router serving only the RPC API, for a dedicated listener
pub fn create_rpc_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v0", rpc_routes())
        .fallback(handlers::unsupported)
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::logging_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn rpc_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/version",
            get(handlers::version)
                .post(handlers::version)
                .fallback(handlers::unsupported),
        )
        .route(
            "/repo/gc",
            get(handlers::gc).post(handlers::gc).fallback(handlers::unsupported),
        )
        .route(
            "/http-gateway-healthcheck",
            get(handlers::healthcheck).fallback(handlers::unsupported),
        )
        .fallback(handlers::unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Gateway, GatewayConfig, UNSUPPORTED_API};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ipgate_node::{FlexibleNode, MemoryNode};
    use tower::ServiceExt;

    fn rpc_router() -> Router {
        let config = GatewayConfig {
            probe_redirects: false,
            ..Default::default()
        };
        let state = Gateway::construct(config)
            .unwrap()
            .attach(FlexibleNode::Memory(MemoryNode::new()));
        create_rpc_router(Arc::new(state))
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_rpc_router_serves_api() {
        let router = rpc_router();

        let (status, body) = send(&router, "POST", "/api/v0/repo/gc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");

        let (status, body) = send(&router, "GET", "/api/v0/http-gateway-healthcheck").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_rpc_router_rejects_everything_else() {
        let router = rpc_router();

        for (method, uri) in [
            ("GET", "/api/v0/cat"),
            ("DELETE", "/api/v0/version"),
            ("GET", "/ipfs/bafkqaddimvwgy3zao5xxe3debi"),
        ] {
            let (status, body) = send(&router, method, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
            assert_eq!(body, UNSUPPORTED_API);
        }
    }
}
