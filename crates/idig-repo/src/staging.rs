//! Staging reference names for out-of-band attachment uploads.
//!
//! An uploaded attachment blob becomes reachable through a named reference
//! before any commit references it. The reference name encodes the
//! `(name, checksum)` pair so concurrent uploads of the same content are
//! idempotent and distinct contents under one name stay addressable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Prefix for all attachment staging references.
pub const STAGING_PREFIX: &str = "refs/attachments/";

/// The staging reference name for an attachment.
///
/// `refs/attachments/<base64url(name + "/" + checksum)>`, unpadded, so the
/// encoded pair is always a single safe path component.
pub fn staging_ref(name: &str, checksum: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(format!("{name}/{checksum}"));
    format!("{STAGING_PREFIX}{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_name_and_checksum() {
        let r = staging_ref("photo.jpg", "sha-abc");
        assert!(r.starts_with(STAGING_PREFIX));
        let encoded = r.strip_prefix(STAGING_PREFIX).unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        assert_eq!(decoded, b"photo.jpg/sha-abc");
    }

    #[test]
    fn no_padding_in_ref_names() {
        // Lengths chosen so standard base64 would need padding.
        for name in ["a", "ab", "abc", "abcd"] {
            assert!(!staging_ref(name, "c").contains('='));
        }
    }

    #[test]
    fn distinct_checksums_distinct_refs() {
        assert_ne!(staging_ref("one", "sum1"), staging_ref("one", "sum2"));
        assert_ne!(staging_ref("one", "sum1"), staging_ref("two", "sum1"));
    }

    #[test]
    fn slash_in_name_stays_encoded() {
        let r = staging_ref("dir/photo.jpg", "sum");
        let encoded = r.strip_prefix(STAGING_PREFIX).unwrap();
        assert!(!encoded.contains('/'));
    }
}
