//! DNS-label encoding for DNSLink names
//!
//! A fully qualified name such as `en.wikipedia-on-ipfs.org` cannot be
//! placed in a single subdomain label. The inlined form doubles every `-`
//! and then turns every `.` into `-`, giving `en-wikipedia--on--ipfs-org`.

/// Returns true if the label is already in the inlined (single-label) form
pub fn is_inlined_label(label: &str) -> bool {
    !label.contains('.') && label.contains('-')
}

/// Encode a DNS name into a single DNS-safe label
pub fn encode_label(name: &str) -> String {
    name.replace('-', "--").replace('.', "-")
}

/// Decode an inlined label back into the DNS name it was built from
pub fn decode_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' {
            if chars.peek() == Some(&'-') {
                chars.next();
                out.push('-');
            } else {
                out.push('.');
            }
        } else {
            out.push(c);
        }
    }
    out
}
