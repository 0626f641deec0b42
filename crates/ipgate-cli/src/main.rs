//! ipgate - read-only IPFS/IPNS HTTP gateway

use clap::Parser;
use ipgate_cli::{run_server_with_shutdown, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ipgate")]
#[command(about = "Read-only IPFS/IPNS HTTP gateway")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port of the gateway listener
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    port: u16,

    /// Serve the RPC API on its own port as well
    #[arg(long, env = "RPC_PORT")]
    rpc_port: Option<u16>,

    /// Kubo RPC API URL
    #[arg(long, default_value = "http://localhost:5001", env = "IPFS_API_URL")]
    ipfs_url: String,

    /// Redirect path-style requests to subdomain origins
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "USE_SUBDOMAINS")]
    use_subdomains: bool,

    /// Log request headers
    #[arg(long, env = "ECHO_HEADERS")]
    echo_headers: bool,

    /// Enable debug logging
    #[arg(short, long, env = "DEBUG")]
    debug: bool,

    /// DNS-over-HTTPS endpoints for DNSLink lookups (comma separated)
    #[arg(long, value_delimiter = ',', env = "DNS_RESOLVERS")]
    dns_resolvers: Vec<String>,

    /// Kubo-compatible name API tried after DNSLink
    #[arg(long, env = "DELEGATED_RESOLVER_URL")]
    delegated_resolver_url: Option<String>,

    /// Probe domains for redirects before DNSLink lookups
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "PROBE_REDIRECTS")]
    probe_redirects: bool,

    /// Maximum number of cached name resolutions
    #[arg(long, default_value = "1000", env = "NAME_CACHE_SIZE")]
    name_cache_size: usize,

    /// Lifetime of cached name resolutions (seconds)
    #[arg(long, default_value = "86400", env = "NAME_CACHE_TTL_SECS")]
    name_cache_ttl_secs: u64,

    /// Use an in-memory node (for testing, content will not persist)
    #[arg(long, env = "MEMORY_NODE")]
    memory_node: bool,

    /// Upper bound for garbage collection (milliseconds)
    #[arg(long, default_value = "20000", env = "GC_TIMEOUT_MS")]
    gc_timeout_ms: u64,

    /// Upper bound for the health probe (milliseconds)
    #[arg(long, default_value = "1000", env = "HEALTHCHECK_TIMEOUT_MS")]
    healthcheck_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "ipgate_cli={0},ipgate_core={0},ipgate_node={0},tower_http=debug",
                log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ipgate on {}:{}", args.host, args.port);
    tracing::info!("IPFS API: {}", args.ipfs_url);

    if !args.use_subdomains {
        tracing::info!("Subdomain redirects disabled, serving path-style requests directly");
    }

    if args.memory_node {
        tracing::warn!("Using an in-memory node - content will NOT persist!");
    }

    let config = GatewayConfig {
        host: args.host,
        http_port: args.port,
        rpc_port: args.rpc_port,
        ipfs_url: args.ipfs_url,
        use_subdomains: args.use_subdomains,
        echo_headers: args.echo_headers,
        dns_resolvers: args.dns_resolvers,
        delegated_resolver_url: args.delegated_resolver_url,
        probe_redirects: args.probe_redirects,
        name_cache_size: args.name_cache_size,
        name_cache_ttl_secs: args.name_cache_ttl_secs,
        use_memory_node: args.memory_node,
        gc_timeout_ms: args.gc_timeout_ms,
        healthcheck_timeout_ms: args.healthcheck_timeout_ms,
    };

    run_server_with_shutdown(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
