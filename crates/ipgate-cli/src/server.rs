//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the gateway server until the process is stopped
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Run the gateway server until `shutdown_signal` completes
///
/// When an RPC port is configured the `/api/v0` routes are also served on
/// their own listener, which shuts down together with the gateway.
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);
    let shutdown = CancellationToken::new();

    let rpc_task = match config.rpc_bind_addr() {
        Some(addr) => {
            let listener = TcpListener::bind(&addr).await?;
            info!("RPC API listening on http://{}", addr);
            let app = routes::create_rpc_router(Arc::clone(&state));
            let stop = shutdown.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
            }))
        }
        None => None,
    };

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway listening on http://{}", addr);

    let app = routes::create_router(state);
    let stop = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.await;
            stop.cancel();
        })
        .await;

    shutdown.cancel();
    if let Some(task) = rpc_task {
        task.await??;
    }
    served?;

    info!("Gateway shutdown complete");
    Ok(())
}
