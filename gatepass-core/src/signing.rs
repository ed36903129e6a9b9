//! Canonical query serialization and HMAC-SHA512 signatures for the
//! payment gateway. The canonical string is the signing input on both the
//! outbound redirect and the inbound callback, so it must be byte-stable.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Query parameters keyed in lexicographic order.
pub type QueryParams = BTreeMap<String, String>;

/// Percent-encodes a key or value, spaces as `+`.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Drops empty values, sorts by key, encodes, and joins as `k=v&k=v`.
pub fn canonical_query(params: &QueryParams) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex HMAC-SHA512 of `canonical` under `secret`.
pub fn sign(secret: &[u8], canonical: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Recomputes the signature and compares it in constant time.
/// Hex case in `provided` is ignored.
pub fn verify(secret: &[u8], canonical: &str, provided: &str) -> bool {
    let expected = sign(secret, canonical);
    let provided = provided.to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
