//! Source dependencies and their fingerprints.
//!
//! A cache entry records a [`Fingerprint`] for every [`Resource`] it was built
//! from. The entry stays valid only while every recorded fingerprint still
//! matches the filesystem.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A source the cached value depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    /// A single file; tracked by its own modification time.
    File {
        /// Absolute path to the file.
        path: PathBuf,
    },
    /// A directory; tracked by the newest modification time found anywhere
    /// beneath it, so adding, removing or editing any descendant invalidates.
    Directory {
        /// Absolute path to the directory.
        path: PathBuf,
    },
}

impl Resource {
    /// File resource at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Directory resource at `path`.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory { path: path.into() }
    }

    /// Filesystem path of the resource.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path } | Self::Directory { path } => path,
        }
    }

    /// Capture the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`io::ErrorKind::NotFound`] if the resource is
    /// missing or is not of the declared kind, and any other I/O error raised
    /// while reading metadata.
    pub fn fingerprint(&self) -> io::Result<Fingerprint> {
        let stamp = match self {
            Self::File { path } => {
                let meta = fs::metadata(path)?;
                if !meta.is_file() {
                    return Err(not_found(path, "not a file"));
                }
                mtime_nanos(&meta)?
            }
            Self::Directory { path } => {
                let meta = fs::metadata(path)?;
                if !meta.is_dir() {
                    return Err(not_found(path, "not a directory"));
                }
                let mut visited = HashSet::from([fs::canonicalize(path)?]);
                newest_in_tree(path, mtime_nanos(&meta)?, &mut visited)?
            }
        };

        Ok(Fingerprint {
            resource: self.clone(),
            stamp,
        })
    }
}

/// Recorded state of a [`Resource`] at the time a cache entry was written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The tracked resource.
    pub resource: Resource,
    /// Modification time in nanoseconds since the Unix epoch (newest
    /// descendant for directories).
    pub stamp: u64,
}

impl Fingerprint {
    /// Check whether the resource is unchanged since this fingerprint was taken.
    ///
    /// A resource that can no longer be read is never fresh.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        match self.resource.fingerprint() {
            Ok(current) => current.stamp == self.stamp,
            Err(e) => {
                tracing::debug!(
                    path = %self.resource.path().display(),
                    error = %e,
                    "Fingerprinted resource unavailable"
                );
                false
            }
        }
    }
}

fn not_found(path: &Path, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: {what}", path.display()),
    )
}

fn mtime_nanos(meta: &fs::Metadata) -> io::Result<u64> {
    let modified = meta.modified()?;
    Ok(nanos_since_epoch(modified))
}

fn nanos_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Newest modification time under `dir`, starting from `newest`.
///
/// Hidden entries are skipped. Symlinks are followed; `visited` holds the
/// canonical paths of directories already walked so link cycles terminate.
fn newest_in_tree(
    dir: &Path,
    mut newest: u64,
    visited: &mut HashSet<PathBuf>,
) -> io::Result<u64> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            // Dangling symlink
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        newest = newest.max(mtime_nanos(&meta)?);

        if meta.is_dir() && visited.insert(fs::canonicalize(&path)?) {
            newest = newest_in_tree(&path, newest, visited)?;
        }
    }
    Ok(newest)
}
