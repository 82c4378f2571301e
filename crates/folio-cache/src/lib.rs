//! Cache store for folio.
//!
//! This crate provides generic caching traits that decouple cache consumers
//! from the underlying storage mechanism. Two traits form the core API:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Keyed blob store with fingerprint-based invalidation
//!
//! Entries are addressed by a [`CacheKey`] (SHA-256 of the value's identity)
//! and validated against the [`Fingerprint`]s of the [`Resource`]s they were
//! built from.
//!
//! # Implementations
//!
//! - [`NullCache`] / [`NullCacheBucket`]: No-op implementations (always miss)
//! - [`FileCache`]: File-based implementation with atomic writes and version
//!   validation
//!
//! # Example
//!
//! ```
//! use folio_cache::{Cache, CacheKey, NullCache};
//!
//! let cache = NullCache;
//! let bucket = cache.bucket("pages");
//! let key = CacheKey::from_parts(&["/docs", "guide", "v1"]);
//! bucket.write(&key, b"{}", &[]).unwrap();
//! assert_eq!(bucket.get(&key).unwrap(), None); // NullCache always misses
//! ```

mod ext;
mod file;
mod key;
mod resource;

use std::path::PathBuf;

pub use ext::CacheBucketExt;
pub use file::FileCache;
pub use key::CacheKey;
pub use resource::{Fingerprint, Resource};

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing a cache file failed.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A value could not be encoded for storage.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A named partition within a [`Cache`].
///
/// Each entry pairs a payload with the fingerprints of the resources it was
/// built from. A hit requires that every recorded fingerprint is still fresh.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached payload.
    ///
    /// Returns `Ok(Some(payload))` if the entry exists and all of its recorded
    /// fingerprints are fresh. Returns `Ok(None)` on a missing entry, a stale
    /// entry, or an unreadable entry header.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the entry exists but cannot be read.
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a payload together with its source fingerprints.
    ///
    /// Payload and fingerprints are published together: a concurrent reader
    /// observes either the previous entry or the new one, never a mix.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the entry cannot be written.
    fn write(
        &self,
        key: &CacheKey,
        payload: &[u8],
        fingerprints: &[Fingerprint],
    ) -> Result<(), CacheError>;
}

/// Factory for named cache [`CacheBucket`]s.
///
/// A `Cache` produces buckets that are logically isolated from each other.
/// For example, a file-based cache stores each bucket in a separate
/// subdirectory.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    ///
    /// Calling `bucket` multiple times with the same name may return
    /// independent handles that share the same underlying storage.
    ///
    /// # Arguments
    ///
    /// * `name` - Bucket name (e.g., "pages")
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// No-op [`CacheBucket`] that never stores or retrieves data.
///
/// Every `get` returns `None`; every `write` is silently discarded.
/// Used as the bucket type for [`NullCache`].
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    fn write(
        &self,
        _key: &CacheKey,
        _payload: &[u8],
        _fingerprints: &[Fingerprint],
    ) -> Result<(), CacheError> {
        Ok(())
    }
}

/// No-op [`Cache`] that always returns [`NullCacheBucket`]s.
///
/// Use when caching is disabled. Every build rebuilds from source.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}
