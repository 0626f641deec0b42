//! `ContentFetcher` backed by a content node
//!
//! Turns `ipfs://` / `ipns://` URIs into responses: names are resolved with
//! the [`NameResolver`], directories are answered with a redirect or their
//! index document, and the content type is classified once from the first
//! non-empty chunk.

use crate::ContentNode;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::stream::{self, StreamExt};
use http::header::{HeaderValue, CONTENT_TYPE, ETAG};
use http::{HeaderMap, StatusCode};
use ipgate_core::{
    cancellable, classify, parse_path, parse_uri, ByteStream, ContentFetcher, ContentResponse,
    DirectoryStat, EntryStat, FetchOptions, GatewayError, NameResolver, Namespace, ParsedAddress,
    RedirectMode, ResolveOptions, Result, RootResolver,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Multihash code of identity (inline) CIDs
const IDENTITY_HASH: u64 = 0x00;

/// Response header naming the served content path
pub const X_IPFS_PATH: &str = "x-ipfs-path";

/// Serves gateway content from a [`ContentNode`]
pub struct NodeFetcher<N> {
    node: Arc<N>,
    resolver: Arc<NameResolver>,
    roots: RootResolver,
}

impl<N: ContentNode + 'static> NodeFetcher<N> {
    pub fn new(node: Arc<N>, resolver: Arc<NameResolver>) -> Self {
        Self {
            node,
            resolver,
            roots: RootResolver::default(),
        }
    }

    async fn serve(&self, uri: &str, options: &FetchOptions) -> Result<ContentResponse> {
        let requested = parse_uri(uri)?;
        let cancel = &options.cancel;

        let content = match requested.namespace {
            Namespace::Ipfs => requested.clone(),
            Namespace::Ipns => {
                let resolve = ResolveOptions::new(cancel.clone(), requested.relative_path.clone());
                parse_path(&self.resolver.resolve(&requested.address, resolve).await?)?
            }
        };

        let cid = content
            .cid()
            .ok_or_else(|| GatewayError::InvalidAddress(format!("{} does not name a CID", content)))?;

        if cid.hash().code() == IDENTITY_HASH {
            return serve_inline(&requested, &content, &cid);
        }

        let path = decode_path(&content.relative_path)?;
        let entry = self.stat(&cid, &path, cancel).await?;

        let (file_path, entry) = if entry.is_directory() {
            if options.redirect == RedirectMode::Manual && !has_trailing_slash(uri) {
                let location = format!("{}/", last_segment(&requested));
                debug!(uri = %uri, location = %location, "directory without trailing slash");
                return ContentResponse::redirect(StatusCode::MOVED_PERMANENTLY, &location);
            }
            let root = self.roots.resolve_root(self, &cid, &path, cancel).await?;
            (root.path, root.entry)
        } else {
            (path, entry)
        };

        let body = self.node.cat(&cid, &file_path, cancel).await?;
        let (first, body) = prebuffer(body, cancel).await?;
        let mime = classify(&first, &file_path);
        debug!(uri = %uri, path = %file_path, mime = %mime, "serving content");

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, CONTENT_TYPE, &mime)?;
        insert_header(&mut headers, X_IPFS_PATH, &requested.to_path())?;
        insert_header(&mut headers, ETAG, &format!("\"{}\"", entry.cid))?;

        Ok(ContentResponse::ok(headers, body))
    }
}

#[async_trait]
impl<N: ContentNode + 'static> DirectoryStat for NodeFetcher<N> {
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat> {
        Ok(self.node.stat(cid, path, cancel).await?)
    }
}

#[async_trait]
impl<N: ContentNode + 'static> ContentFetcher for NodeFetcher<N> {
    #[instrument(skip(self, options), fields(redirect = ?options.redirect))]
    async fn fetch(&self, uri: &str, options: FetchOptions) -> Result<ContentResponse> {
        match self.serve(uri, &options).await {
            Ok(response) => Ok(response),
            Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled),
            Err(e) => {
                debug!(uri = %uri, error = %e, "fetch failed");
                Ok(ContentResponse::from(e))
            }
        }
    }
}

/// Identity CIDs carry their content in the multihash digest
fn serve_inline(requested: &ParsedAddress, content: &ParsedAddress, cid: &Cid) -> Result<ContentResponse> {
    if !content.relative_path.is_empty() {
        return Err(GatewayError::NotFound(content.to_path()));
    }

    let data = Bytes::copy_from_slice(cid.hash().digest());
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, CONTENT_TYPE, &classify(&data, ""))?;
    insert_header(&mut headers, X_IPFS_PATH, &requested.to_path())?;
    insert_header(&mut headers, ETAG, &format!("\"{}\"", cid))?;

    Ok(ContentResponse::ok(headers, stream::once(async move { Ok::<_, std::io::Error>(data) }).boxed()))
}

/// Wait for the first non-empty chunk and put it back in front of the stream
async fn prebuffer(mut body: ByteStream, cancel: &CancellationToken) -> Result<(Bytes, ByteStream)> {
    loop {
        let next = cancellable(cancel, async { Ok::<_, GatewayError>(body.next().await) }).await?;
        match next {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                let rest = stream::once({
                    let chunk = chunk.clone();
                    async move { Ok(chunk) }
                })
                .chain(body)
                .boxed();
                return Ok((chunk, rest));
            }
            Some(Err(e)) => return Err(GatewayError::Streaming(e.to_string())),
            None => return Ok((Bytes::new(), stream::empty().boxed())),
        }
    }
}

/// Percent-decode each segment of a sanitized path
fn decode_path(path: &str) -> Result<String> {
    let mut decoded = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let segment = urlencoding::decode(segment)
            .map_err(|e| GatewayError::InvalidAddress(format!("bad path segment '{}': {}", segment, e)))?;
        decoded.push('/');
        decoded.push_str(&segment);
    }
    Ok(decoded)
}

fn has_trailing_slash(uri: &str) -> bool {
    uri.split(['?', '#']).next().unwrap_or_default().ends_with('/')
}

/// Last segment of the requested path, the address for a bare root
fn last_segment(requested: &ParsedAddress) -> &str {
    requested
        .relative_path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(requested.address.as_str())
}

fn insert_header(headers: &mut HeaderMap, name: impl http::header::IntoHeaderName, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Streaming(format!("invalid header value '{}'", value)))?;
    headers.insert(name, value);
    Ok(())
}
