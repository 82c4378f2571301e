//! File-based cache implementation.
//!
//! [`FileCache`] stores cache entries as files on disk, organized into buckets
//! (subdirectories) and shards (first two hex characters of the key). Each
//! entry is a single file with a binary header followed by the data:
//!
//! ```text
//! [header_len: u32 LE][header: JSON array of fingerprints][data bytes]
//! ```
//!
//! On read, only the header is read first to validate the fingerprints. The
//! full data is read only on cache hit, avoiding unnecessary I/O when the
//! sources changed.
//!
//! Writes go to a temporary file next to the entry which is synced and then
//! renamed over it, so an entry is never observed half-written.
//!
//! On construction, [`FileCache`] validates a `VERSION` file in the cache root.
//! If the version mismatches or is missing, the entire cache directory is wiped
//! and recreated. This ensures entries written in an older format are never used.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Cache, CacheBucket, CacheError, CacheKey, Fingerprint};

/// Upper bound for a header length; anything larger is treated as corruption.
const MAX_HEADER_LEN: usize = 16 * 1024 * 1024;

/// Distinguishes temporary files written concurrently by one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-based [`Cache`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION              # contains the cache format version string
/// +-- pages/               # bucket "pages"
///     +-- 3f/              # shard (first two digest characters)
///         +-- 3fa4...e1    # cache entry
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a new file-based cache at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// cache directory is removed and recreated with the new version. Errors
    /// during validation are logged but never fatal; a directory that cannot
    /// be created surfaces later as a write error.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

/// A single bucket backed by a directory on disk.
struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.shard()).join(key.digest())
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };

        let Some(fingerprints) = read_header(&mut file, &path)? else {
            return Ok(None);
        };

        // Validate fingerprints before touching the payload
        if let Some(stale) = fingerprints.iter().find(|fp| !fp.is_fresh()) {
            tracing::debug!(
                key = %key,
                source = %stale.resource.path().display(),
                "Cache entry stale"
            );
            return Ok(None);
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| CacheError::io(&path, e))?;
        tracing::debug!(key = %key, "Cache hit");
        Ok(Some(data))
    }

    fn write(
        &self,
        key: &CacheKey,
        payload: &[u8],
        fingerprints: &[Fingerprint],
    ) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let shard_dir = self.dir.join(key.shard());
        fs::create_dir_all(&shard_dir).map_err(|e| CacheError::io(&shard_dir, e))?;

        let header = serde_json::to_vec(fingerprints)?;
        let header_len = u32::try_from(header.len()).map_err(|_| {
            CacheError::io(
                &path,
                io::Error::new(io::ErrorKind::InvalidInput, "fingerprint header too large"),
            )
        })?;

        let mut buf = Vec::with_capacity(4 + header.len() + payload.len());
        buf.extend_from_slice(&header_len.to_le_bytes());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(payload);

        let tmp = shard_dir.join(format!(
            "{}.tmp-{}-{}",
            key.digest(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = write_synced(&tmp, &buf) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::io(tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::io(path, e));
        }

        tracing::debug!(key = %key, bytes = buf.len(), "Cache entry written");
        Ok(())
    }
}

/// Read the fingerprint header of an entry.
///
/// Returns `Ok(None)` when the header is truncated or undecodable.
fn read_header(file: &mut File, path: &Path) -> Result<Option<Vec<Fingerprint>>, CacheError> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = file.read_exact(&mut len_buf) {
        return corrupt_or_io(path, e);
    }
    let header_len = u32::from_le_bytes(len_buf) as usize;
    if header_len > MAX_HEADER_LEN {
        tracing::warn!(path = %path.display(), header_len, "Cache entry header too large");
        return Ok(None);
    }

    let mut header = vec![0u8; header_len];
    if let Err(e) = file.read_exact(&mut header) {
        return corrupt_or_io(path, e);
    }

    match serde_json::from_slice(&header) {
        Ok(fingerprints) => Ok(Some(fingerprints)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry header");
            Ok(None)
        }
    }
}

fn corrupt_or_io<T>(path: &Path, e: io::Error) -> Result<Option<T>, CacheError> {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        tracing::warn!(path = %path.display(), "Truncated cache entry");
        Ok(None)
    } else {
        Err(CacheError::io(path, e))
    }
}

fn write_synced(path: &Path, buf: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(buf)?;
    file.sync_all()
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    // Try to read the existing version
    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            // Version matches, keep cache
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    // Wipe and recreate
    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::Resource;
    use tempfile::TempDir;

    fn key(name: &str) -> CacheKey {
        CacheKey::from_parts(&["/docs", name, "v1"])
    }

    fn source_file(dir: &Path, name: &str, mtime_secs: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        touch(&path, mtime_secs);
        path
    }

    fn touch(path: &Path, mtime_secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
            .unwrap();
    }

    #[test]
    fn test_file_bucket_write_and_get() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        bucket.write(&key("page"), b"<html>hello</html>", &[]).unwrap();
        let result = bucket.get(&key("page")).unwrap();
        assert_eq!(result, Some(b"<html>hello</html>".to_vec()));
    }

    #[test]
    fn test_file_bucket_entry_is_sharded() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        let k = key("page");

        bucket.write(&k, b"data", &[]).unwrap();

        let entry = root.join("pages").join(k.shard()).join(k.digest());
        assert!(entry.is_file());
        // No temporary files left behind
        let leftovers: Vec<_> = fs::read_dir(entry.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_bucket_fresh_fingerprint_hits() {
        let tmp = TempDir::new().unwrap();
        let src = source_file(tmp.path(), "page.md", 1_000);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        let fp = Resource::file(&src).fingerprint().unwrap();
        bucket.write(&key("page"), b"data", &[fp]).unwrap();

        assert_eq!(bucket.get(&key("page")).unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn test_file_bucket_stale_fingerprint_misses() {
        let tmp = TempDir::new().unwrap();
        let src = source_file(tmp.path(), "page.md", 1_000);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        let fp = Resource::file(&src).fingerprint().unwrap();
        bucket.write(&key("page"), b"data", &[fp]).unwrap();

        touch(&src, 2_000);
        assert_eq!(bucket.get(&key("page")).unwrap(), None);
    }

    #[test]
    fn test_file_bucket_removed_source_misses() {
        let tmp = TempDir::new().unwrap();
        let src = source_file(tmp.path(), "page.md", 1_000);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        let fp = Resource::file(&src).fingerprint().unwrap();
        bucket.write(&key("page"), b"data", &[fp]).unwrap();

        fs::remove_file(&src).unwrap();
        assert_eq!(bucket.get(&key("page")).unwrap(), None);
    }

    #[test]
    fn test_file_bucket_get_nonexistent_key() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        assert_eq!(bucket.get(&key("nonexistent")).unwrap(), None);
    }

    #[test]
    fn test_file_bucket_overwrite() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        bucket.write(&key("page"), b"first", &[]).unwrap();
        bucket.write(&key("page"), b"second", &[]).unwrap();

        assert_eq!(bucket.get(&key("page")).unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_file_bucket_truncated_entry_misses() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        let k = key("page");

        let entry = root.join("pages").join(k.shard()).join(k.digest());
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, [0xFF, 0x00]).unwrap();

        assert_eq!(bucket.get(&k).unwrap(), None);
    }

    #[test]
    fn test_file_bucket_garbage_header_misses() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        let k = key("page");

        let entry = root.join("pages").join(k.shard()).join(k.digest());
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        let mut buf = 3u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"{{{payload");
        fs::write(&entry, buf).unwrap();

        assert_eq!(bucket.get(&k).unwrap(), None);
    }

    #[test]
    fn test_file_cache_buckets_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        let bucket_a = cache.bucket("alpha");
        let bucket_b = cache.bucket("beta");

        bucket_a.write(&key("k"), b"alpha-data", &[]).unwrap();
        bucket_b.write(&key("k"), b"beta-data", &[]).unwrap();

        assert_eq!(bucket_a.get(&key("k")).unwrap(), Some(b"alpha-data".to_vec()));
        assert_eq!(bucket_b.get(&key("k")).unwrap(), Some(b"beta-data".to_vec()));
    }

    #[test]
    fn test_file_bucket_binary_data() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("pages");

        // Binary data including \n, \r, null bytes, and high bytes
        let binary_data: Vec<u8> = vec![0x00, 0x01, 0x0A, 0x0D, 0xFF, 0xFE, 0x80, 0x7F];
        bucket.write(&key("binary"), &binary_data, &[]).unwrap();
        assert_eq!(bucket.get(&key("binary")).unwrap(), Some(binary_data));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_bucket_unwritable_dir_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        let k = key("page");

        let shard = root.join("pages").join(k.shard());
        fs::create_dir_all(&shard).unwrap();
        fs::set_permissions(&shard, fs::Permissions::from_mode(0o500)).unwrap();

        // Privileged users bypass permission bits; nothing to observe then
        let probe = shard.join("probe");
        if fs::write(&probe, b"").is_ok() {
            let _ = fs::remove_file(&probe);
            return;
        }

        let result = bucket.write(&k, b"data", &[]);
        fs::set_permissions(&shard, fs::Permissions::from_mode(0o700)).unwrap();
        assert!(matches!(result, Err(CacheError::Io { .. })));
    }

    #[test]
    fn test_version_match_keeps_cache() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        // Create cache and populate it
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        bucket.write(&key("page"), b"preserved", &[]).unwrap();

        // Same version keeps entries
        let cache2 = FileCache::new(root, "v1");
        let bucket2 = cache2.bucket("pages");
        assert_eq!(bucket2.get(&key("page")).unwrap(), Some(b"preserved".to_vec()));
    }

    #[test]
    fn test_version_mismatch_wipes_cache() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        // Create cache and populate it
        let cache = FileCache::new(root.clone(), "v1");
        let bucket = cache.bucket("pages");
        bucket.write(&key("page"), b"will-be-wiped", &[]).unwrap();

        // Different version wipes entries
        let cache2 = FileCache::new(root.clone(), "v2");
        let bucket2 = cache2.bucket("pages");
        assert_eq!(bucket2.get(&key("page")).unwrap(), None);

        // VERSION file updated
        let version = fs::read_to_string(root.join("VERSION")).unwrap();
        assert_eq!(version, "v2");
    }

    #[test]
    fn test_nonexistent_root_creates_version() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("deeply/nested/cache");

        // Root doesn't exist yet
        assert!(!root.exists());

        let cache = FileCache::new(root.clone(), "v1");

        // Directory and VERSION created
        assert_eq!(cache.root(), root.as_path());
        let version = fs::read_to_string(root.join("VERSION")).unwrap();
        assert_eq!(version, "v1");
    }
}
