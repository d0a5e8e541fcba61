//! Content hashing for installed component and util files.
//!
//! Installed files are tracked by the SHA-256 of their exact bytes. A hash
//! mismatch means the file was edited locally since it was last written.

use sha2::{Digest, Sha256};
use std::fmt;

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a recorded hex digest against the given data.
    pub fn matches(recorded: &str, data: &[u8]) -> bool {
        ContentHash::compute(data).0.eq_ignore_ascii_case(recorded)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_deterministic() {
        let h1 = ContentHash::compute(b"export const a = 1;");
        let h2 = ContentHash::compute(b"export const a = 1;");
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_differs_for_different_data() {
        assert_ne!(ContentHash::compute(b"a"), ContentHash::compute(b"b"));
    }

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            ContentHash::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matches_is_case_insensitive() {
        let recorded = ContentHash::compute(b"button").to_string().to_uppercase();
        assert!(ContentHash::matches(&recorded, b"button"));
        assert!(!ContentHash::matches(&recorded, b"button "));
    }
}
