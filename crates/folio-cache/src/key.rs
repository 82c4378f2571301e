//! Content-addressed cache keys.
//!
//! Provides [`CacheKey`] for turning the identity of a cached value into a
//! stable file name.

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest identifying one cache entry.
///
/// Built from an ordered list of parts (e.g., content root, logical path and
/// version). Parts are joined with a NUL byte before hashing, so
/// `["ab", "c"]` and `["a", "bc"]` produce different keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
}

impl CacheKey {
    /// Compute the key for the given parts.
    ///
    /// # Hash Format
    ///
    /// Hex-encoded SHA-256 of `parts.join("\0")`.
    #[must_use]
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update([0u8]);
            }
            hasher.update(part.as_bytes());
        }
        Self {
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Full hex digest (64 characters).
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Shard directory name: the first two hex characters of the digest.
    ///
    /// Spreads entries over 256 subdirectories so no single directory grows
    /// unbounded.
    #[must_use]
    pub fn shard(&self) -> &str {
        &self.digest[..2]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}
