//! Helpers for telling node identities and content identifiers apart

use crate::address::Namespace;
use cid::{Cid, Version};
use multibase::Base;
use multihash::Multihash;

/// Multicodec for libp2p public keys
pub const LIBP2P_KEY_CODEC: u64 = 0x72;

const IDENTITY_HASH: u64 = 0x00;
const SHA2_256_HASH: u64 = 0x12;

/// Longest label a DNS name may carry
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Parse a node identity in its legacy base58 form (`Qm...` or `12D3Koo...`)
pub fn parse_base58_peer_id(address: &str) -> Option<Multihash<64>> {
    if !(address.starts_with("Qm") || address.starts_with('1')) {
        return None;
    }
    let bytes = Base::Base58Btc.decode(address).ok()?;
    let mh = Multihash::<64>::from_bytes(&bytes).ok()?;
    matches!(mh.code(), IDENTITY_HASH | SHA2_256_HASH).then_some(mh)
}

/// Returns true if the address is a node identity in any supported form
pub fn is_peer_id(address: &str) -> bool {
    if parse_base58_peer_id(address).is_some() {
        return true;
    }
    Cid::try_from(address)
        .map(|cid| cid.codec() == LIBP2P_KEY_CODEC)
        .unwrap_or(false)
}

/// Returns true if the address is a node identity that is not DNS-safe
///
/// Base58 identities are case-sensitive and cannot survive the lowercasing
/// browsers apply to hostnames.
pub fn is_case_sensitive_peer_id(address: &str) -> bool {
    address.chars().any(|c| c.is_ascii_uppercase()) && parse_base58_peer_id(address).is_some()
}

/// Returns true if the address parses as a CID
pub fn is_cid(address: &str) -> bool {
    Cid::try_from(address).is_ok()
}

/// Normalize a CID to its canonical, case-insensitive CIDv1 string
///
/// Content CIDs are rendered in base32, falling back to base36 when the
/// base32 form does not fit a DNS label. Keys in the `ipns` namespace are
/// always rendered in base36.
pub fn normalize_cid(address: &str, namespace: Namespace) -> Option<String> {
    let cid = Cid::try_from(address).ok()?;
    let v1 = match cid.version() {
        Version::V0 => cid.into_v1().ok()?,
        Version::V1 => cid,
    };

    match namespace {
        Namespace::Ipns => v1.to_string_of_base(Base::Base36Lower).ok(),
        Namespace::Ipfs => {
            let base32 = v1.to_string();
            if base32.len() <= MAX_DNS_LABEL_LEN {
                Some(base32)
            } else {
                v1.to_string_of_base(Base::Base36Lower).ok()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use multihash_codetable::{Code, MultihashDigest};

    /// A valid ed25519-style peer id (identity multihash over a protobuf key)
    pub fn ed25519_peer_id() -> String {
        let mut key = vec![0x08, 0x01, 0x12, 0x20];
        key.extend_from_slice(&[7u8; 32]);
        let mh = Multihash::<64>::wrap(IDENTITY_HASH, &key).unwrap();
        Base::Base58Btc.encode(mh.to_bytes())
    }

    /// A CIDv0 string (`Qm...`)
    pub fn cid_v0(data: &[u8]) -> String {
        Cid::new_v0(Code::Sha2_256.digest(data)).unwrap().to_string()
    }

    /// A raw CIDv1 string (`bafk...`)
    pub fn cid_v1(data: &[u8]) -> String {
        Cid::new_v1(0x55, Code::Sha2_256.digest(data)).to_string()
    }
}
