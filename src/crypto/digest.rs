//! SHA-256 digests used for key ids and hardware fingerprints.

use sha2::{Digest, Sha256};

/// Length of a short key identifier, in hex characters.
pub const KEY_ID_LEN: usize = 8;

/// Compute SHA-256 of `data` and return lowercase hex (64 chars).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Short uppercase identifier: the first 8 hex chars of SHA-256(`data`).
///
/// Used as a human-readable label for a public key. It is not a trust
/// input; only signature verification establishes trust.
pub fn short_id(data: &[u8]) -> String {
    let mut id = sha256_hex(data);
    id.truncate(KEY_ID_LEN);
    id.make_ascii_uppercase();
    id
}

/// Whether `s` looks like a SHA-256 hex digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_short_id_is_uppercase_prefix() {
        assert_eq!(short_id(b"abc"), "BA7816BF");
        assert_eq!(short_id(b"abc").len(), KEY_ID_LEN);
    }

    #[test]
    fn test_short_id_deterministic() {
        assert_eq!(short_id(b"same input"), short_id(b"same input"));
        assert_ne!(short_id(b"input one"), short_id(b"input two"));
    }

    #[test]
    fn test_is_sha256_hex() {
        assert!(is_sha256_hex(&sha256_hex(b"x")));
        assert!(!is_sha256_hex("abc"));
        assert!(!is_sha256_hex(&"z".repeat(64)));
    }
}
