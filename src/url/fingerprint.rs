//! URI fingerprints
//!
//! A fingerprint keeps URIs of one server close together in the 64-bit space: the
//! top 24 bits come from a hash of `scheme://authority`, the low 40 bits from a hash
//! of the whole URI. Since the fingerprint table probes from the top bits, a host's
//! URIs cluster in one region of the table.

use sha2::{Digest, Sha256};
use url::Url;

const HOST_BITS: u32 = 24;
const URI_BITS: u32 = 40;

/// First 8 bytes of the SHA-256 digest, big-endian
pub fn hash64(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(buf)
}

/// The `scheme://authority` prefix of a serialized URI
fn scheme_and_authority(uri: &str) -> &str {
    match uri.find("://") {
        Some(start) => {
            let rest = start + 3;
            match uri[rest..].find('/') {
                Some(slash) => &uri[..rest + slash],
                None => uri,
            }
        }
        None => uri,
    }
}

/// Fingerprint of a serialized URI
pub fn fingerprint_str(uri: &str) -> u64 {
    let host = hash64(scheme_and_authority(uri)) >> (64 - HOST_BITS);
    let full = hash64(uri) >> (64 - URI_BITS);
    (host << URI_BITS) | full
}

/// Fingerprint of a URI
pub fn fingerprint(uri: &Url) -> u64 {
    fingerprint_str(uri.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_and_authority() {
        assert_eq!(
            scheme_and_authority("http://ex.com:81/a/b"),
            "http://ex.com:81"
        );
        assert_eq!(scheme_and_authority("http://ex.com"), "http://ex.com");
        assert_eq!(scheme_and_authority("urn:isbn:1"), "urn:isbn:1");
    }

    #[test]
    fn test_same_host_shares_high_bits() {
        let a = fingerprint_str("http://ex.com/a");
        let b = fingerprint_str("http://ex.com/b");
        assert_eq!(a >> URI_BITS, b >> URI_BITS);
        assert_ne!(a, b);
    }

    #[test]
    fn test_scheme_is_part_of_host_bits() {
        let a = fingerprint_str("http://ex.com/a");
        let b = fingerprint_str("https://ex.com/a");
        assert_ne!(a >> URI_BITS, b >> URI_BITS);
    }

    #[test]
    fn test_deterministic() {
        let uri = Url::parse("http://ex.com/a?x=1").unwrap();
        assert_eq!(fingerprint(&uri), fingerprint_str("http://ex.com/a?x=1"));
        assert_eq!(fingerprint(&uri), fingerprint(&uri.clone()));
    }

    #[test]
    fn test_parser_normalisation_collapses_case() {
        let a = Url::parse("http://EX.com/a").unwrap();
        let b = Url::parse("http://ex.com/a").unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
