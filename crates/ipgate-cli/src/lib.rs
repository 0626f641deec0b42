//! # ipgate
//!
//! Read-only IPFS/IPNS HTTP gateway server.
//!
//! This crate provides:
//! - **Gateway routes**: path-style (`/ipfs/<cid>`, `/ipns/<name>`) and
//!   subdomain-style (`<cid>.ipfs.<host>`) content requests
//! - **Origin isolation**: path-style requests are redirected to their own subdomain
//! - **RPC API**: `version`, `repo/gc` and a health probe under `/api/v0`
//! - **Streaming**: responses stream from the content node and stop when the client leaves
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │             (browsers, curl, proxies)               │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                      ipgate                         │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Logging │ CORS │ Trace │ Compression  │
//! ├─────────────────────────────────────────────────────┤
//! │     Gateway handlers       │    RPC API handlers    │
//! ├─────────────────────────────────────────────────────┤
//! │                   ipgate-core                       │
//! │   (addresses, redirects, names, roots, MIME types)  │
//! ├─────────────────────────────────────────────────────┤
//! │                   ipgate-node                       │
//! │              (Kubo RPC, in-memory)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream;

pub use config::GatewayConfig;
pub use context::GatewayRequestContext;
pub use error::{ApiError, UNSUPPORTED_API, USAGE_HINT};
pub use server::{run_server, run_server_with_shutdown};
pub use state::{AppState, Gateway};
