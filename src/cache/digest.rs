//! Key Digest Module
//!
//! Turns arbitrary cache keys into fixed-length, filesystem-safe identifiers.

use sha2::{Digest, Sha256};

/// Length of a key digest in characters (hex-encoded SHA-256)
pub const DIGEST_LEN: usize = 64;

// == Digest Key ==
/// Returns the lowercase hex SHA-256 of `key`.
///
/// The output is stable across processes, so it doubles as the on-disk file
/// stem. Two keys with colliding hashes alias each other; this is accepted.
pub fn digest_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(digest_key("hello"), digest_key("hello"));
        assert_ne!(digest_key("a"), digest_key("b"));
    }

    #[test]
    fn test_digest_known_value() {
        assert_eq!(
            digest_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_filename_safe() {
        let digest = digest_key("../../etc/passwd with spaces/and\\slashes");
        assert_eq!(digest.len(), DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
