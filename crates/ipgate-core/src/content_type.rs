//! Content-Type classification from the first body chunk
//!
//! Rules run in a fixed order and the first hit wins: an SVG root element
//! sniff, then byte signature detection, then the request path's extension,
//! then [`DEFAULT_MIME_TYPE`]. The override table is applied to whatever the
//! chain produced.

use once_cell::sync::Lazy;
use regex::Regex;

/// Type served when nothing else matches
pub const DEFAULT_MIME_TYPE: &str = "text/html";

const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Bytes decoded for the SVG sniff
const SVG_SNIFF_LEN: usize = 64;

static SVG_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(<\?xml[^>]+>)?[^<^\w]*<svg").expect("svg sniff pattern is valid")
});

/// Detected types remapped to a more widely supported equivalent
const OVERRIDES: &[(&str, &str)] = &[("video/quicktime", "video/mp4")];

/// Classify a response from its first non-empty chunk and request path
pub fn classify(chunk: &[u8], path: &str) -> String {
    let detected = sniff_svg(chunk)
        .or_else(|| sniff_bytes(chunk))
        .or_else(|| mime_guess::from_path(path).first_raw())
        .unwrap_or(DEFAULT_MIME_TYPE);

    apply_override(detected).to_string()
}

fn apply_override(mime: &str) -> &str {
    OVERRIDES
        .iter()
        .find(|(from, _)| *from == mime)
        .map_or(mime, |(_, to)| *to)
}

fn sniff_svg(chunk: &[u8]) -> Option<&'static str> {
    let head = String::from_utf8_lossy(&chunk[..chunk.len().min(SVG_SNIFF_LEN)]);
    SVG_ROOT.is_match(&head).then_some(SVG_MIME_TYPE)
}

fn sniff_bytes(chunk: &[u8]) -> Option<&'static str> {
    infer::get(chunk).map(|kind| kind.mime_type())
}
