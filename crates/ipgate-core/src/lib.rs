//! # ipgate core
//!
//! Gateway semantics for a read-only IPFS/IPNS HTTP gateway.
//!
//! This crate provides:
//! - **Address parsing**: path-style, subdomain-style and `ipfs://` URIs
//! - **Redirect policy**: moving path requests onto per-content origins
//! - **Name resolution**: cached DNSLink / node / delegated fallback chain
//! - **Directory roots**: picking the index document of a directory
//! - **Content classification**: MIME type from the first chunk and path
//! - **Streaming**: response bodies that stop reading when the client leaves
//!
//! ## Request flow
//!
//! ```text
//! request ─► address ─► redirect? ─► NameResolver (ipns) ─► ContentFetcher
//!                                                             │
//!        response ◄── CancellableBody ◄── classify ◄── RootResolver (dirs)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ipgate_core::{parse_path, RedirectDecision, RedirectPolicy};
//!
//! let parsed = parse_path("/ipns/en.wikipedia-on-ipfs.org/wiki")?;
//! match RedirectPolicy::new(true).decide(&parsed, "localhost:8080", "http", None) {
//!     RedirectDecision::Redirect(location) => println!("301 -> {}", location),
//!     RedirectDecision::Continue => println!("serve {}", parsed.to_uri()),
//! }
//! ```

pub mod address;
pub mod body;
pub mod cache;
pub mod cancel;
pub mod content_type;
pub mod dnslink;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod redirect;
pub mod resolver;
pub mod root;

pub use address::{parse_host, parse_path, parse_uri, sanitize_path, Namespace, ParsedAddress};
pub use body::{BodyOutcome, CancellableBody};
pub use cache::{CachedResolution, LruTtlCache, ResolutionCache};
pub use cancel::{cancellable, with_timeout};
pub use content_type::{classify, DEFAULT_MIME_TYPE};
pub use error::{GatewayError, Result};
pub use fetch::{ByteStream, ContentFetcher, ContentResponse, FetchOptions, RedirectMode};
pub use redirect::{RedirectDecision, RedirectPolicy};
pub use resolver::{
    DelegatedStrategy, DnsLinkStrategy, HttpRedirectProbe, NameResolver, NameStrategy,
    RedirectProbe, ResolveOptions,
};
pub use root::{DirectoryRoot, DirectoryStat, EntryKind, EntryStat, RootResolver, DEFAULT_ROOT_CANDIDATES};
