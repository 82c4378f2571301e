//! Cache resolution for page tree nodes.
//!
//! [`CacheResolver`] returns the cached serialized form of a node when its
//! source fingerprint is unchanged, and otherwise invokes the supplied build
//! callback and persists the result. The resolver itself holds no build
//! state; recursion happens in the callback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use folio_cache::{Cache, CacheBucket, CacheBucketExt, CacheKey, Resource};

use crate::error::BuildError;
use crate::page::Page;

/// Name of the cache bucket holding serialized pages.
const PAGES_BUCKET: &str = "pages";

/// Outcome of resolving one node.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub page: Page,
    pub from_cache: bool,
}

/// Resolves nodes through the page cache.
///
/// # Thread Safety
///
/// Concurrent calls for the same key are serialized: the second caller waits
/// and then observes the entry written by the first. Distinct keys proceed in
/// parallel.
pub(crate) struct CacheResolver {
    bucket: Box<dyn CacheBucket>,
    locks: KeyLocks,
}

impl CacheResolver {
    pub(crate) fn new(cache: &dyn Cache) -> Self {
        Self {
            bucket: cache.bucket(PAGES_BUCKET),
            locks: KeyLocks::default(),
        }
    }

    /// Resolve the node stored under `key`.
    ///
    /// On a miss, `resource` is fingerprinted before `build` runs, so a source
    /// edited while the node is being built invalidates the entry on the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if `resource` does not exist, and
    /// propagates errors from `build` and from the cache store.
    pub(crate) fn resolve<F>(
        &self,
        key: &CacheKey,
        resource: &Resource,
        build: F,
    ) -> Result<Resolution, BuildError>
    where
        F: FnOnce() -> Result<Page, BuildError>,
    {
        let lock = self.locks.acquire(key);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.resolve_locked(key, resource, build)
        };
        self.locks.release(key, lock);
        result
    }

    fn resolve_locked<F>(
        &self,
        key: &CacheKey,
        resource: &Resource,
        build: F,
    ) -> Result<Resolution, BuildError>
    where
        F: FnOnce() -> Result<Page, BuildError>,
    {
        if let Some(page) = self.bucket.get_json::<Page>(key)? {
            return Ok(Resolution {
                page,
                from_cache: true,
            });
        }

        let fingerprint = resource
            .fingerprint()
            .map_err(|e| BuildError::from_io(resource.path(), e))?;
        let page = build()?;
        self.bucket.write_json(key, &page, &[fingerprint])?;

        Ok(Resolution {
            page,
            from_cache: false,
        })
    }
}

/// One mutex per cache key currently being resolved.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn acquire(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the map entry once no other caller holds or awaits it.
    fn release(&self, key: &CacheKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held here
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use folio_cache::{FileCache, NullCache};

    use super::*;

    fn page(title: &str) -> Page {
        Page {
            title: title.to_owned(),
            ..Page::default()
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.md");
        fs::write(&src, "# A").unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let resolver = CacheResolver::new(&cache);
        let key = CacheKey::from_parts(&["a.md"]);
        let resource = Resource::file(&src);

        let first = resolver
            .resolve(&key, &resource, || Ok(page("A")))
            .unwrap();
        assert!(!first.from_cache);

        let second = resolver
            .resolve(&key, &resource, || panic!("must not rebuild"))
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.page, first.page);
    }

    #[test]
    fn test_missing_resource_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = CacheResolver::new(&NullCache);
        let key = CacheKey::from_parts(&["missing.md"]);
        let resource = Resource::file(tmp.path().join("missing.md"));

        let result = resolver.resolve(&key, &resource, || Ok(page("x")));
        assert!(matches!(result, Err(BuildError::NotFound(_))));
    }

    #[test]
    fn test_removed_source_behind_cached_entry_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.md");
        fs::write(&src, "# A").unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let resolver = CacheResolver::new(&cache);
        let key = CacheKey::from_parts(&["a.md"]);
        let resource = Resource::file(&src);
        resolver.resolve(&key, &resource, || Ok(page("A"))).unwrap();

        fs::remove_file(&src).unwrap();

        let result = resolver.resolve(&key, &resource, || panic!("must not build"));
        assert!(matches!(result, Err(BuildError::NotFound(_))));
    }

    #[test]
    fn test_build_error_is_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.md");
        fs::write(&src, "# A").unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let resolver = CacheResolver::new(&cache);
        let key = CacheKey::from_parts(&["a.md"]);
        let resource = Resource::file(&src);

        let failed = resolver.resolve(&key, &resource, || {
            Err(BuildError::FrontMatter {
                path: "a.md".to_owned(),
                message: "bad".to_owned(),
            })
        });
        assert!(failed.is_err());

        let rebuilt = resolver
            .resolve(&key, &resource, || Ok(page("A")))
            .unwrap();
        assert!(!rebuilt.from_cache);
    }

    #[test]
    fn test_concurrent_same_key_builds_once() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.md");
        fs::write(&src, "# A").unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let resolver = CacheResolver::new(&cache);
        let key = CacheKey::from_parts(&["a.md"]);
        let resource = Resource::file(&src);
        let builds = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    resolver
                        .resolve(&key, &resource, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(page("A"))
                        })
                        .unwrap()
                });
            }
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(resolver.locks.locks.lock().unwrap().is_empty());
    }
}
