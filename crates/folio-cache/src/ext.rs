//! Extension trait for [`CacheBucket`] with typed convenience methods.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CacheBucket, CacheError, CacheKey, Fingerprint};

/// Typed convenience methods for [`CacheBucket`].
///
/// Provides `get_json`/`write_json` for serde-serializable types. These are
/// implemented as default methods on an extension trait so that:
///
/// - [`CacheBucket`] stays object-safe and generic-free
/// - Implementors only need to handle raw bytes
/// - Callers get ergonomic typed access via a blanket impl
///
/// # Example
///
/// ```
/// use folio_cache::{Cache, CacheBucketExt, CacheKey, NullCache};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct PageData { title: String }
///
/// let cache = NullCache;
/// let bucket = cache.bucket("pages");
/// let key = CacheKey::from_parts(&["page"]);
///
/// bucket.write_json(&key, &PageData { title: "Hello".into() }, &[]).unwrap();
/// let data: Option<PageData> = bucket.get_json(&key).unwrap();
/// assert!(data.is_none());
/// ```
pub trait CacheBucketExt: CacheBucket {
    /// Retrieve a JSON-deserialized value from the cache.
    ///
    /// A payload that no longer decodes (corrupt file, older schema) is
    /// logged and reported as a miss so the caller rebuilds it.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from [`CacheBucket::get`].
    fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Store a value as JSON in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encode`] if serialization fails and propagates
    /// write errors from [`CacheBucket::write`].
    fn write_json<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        fingerprints: &[Fingerprint],
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.write(key, &bytes, fingerprints)
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
