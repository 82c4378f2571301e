//! Build error types.

use std::path::PathBuf;

use folio_cache::CacheError;

/// Error raised while building a page tree.
///
/// Missing children are downgraded to diagnostics under
/// [`MissingPagePolicy::Skip`](crate::MissingPagePolicy::Skip); everything
/// else aborts the build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Source file or directory does not exist.
    #[error("Page not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Front matter is not valid YAML or not a mapping.
    #[error("Invalid front matter in {path}: {message}")]
    FrontMatter {
        /// Logical path of the document.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A declared child page does not exist (strict mode only).
    #[error("Page not found: {name} (declared in '{parent}')")]
    MissingPage {
        /// Logical path of the declaring collection.
        parent: String,
        /// Declared identifier.
        name: String,
    },

    /// A declared child entry cannot name a page (strict mode only).
    #[error("Invalid page reference '{reference}' (declared in '{parent}')")]
    InvalidReference {
        /// Logical path of the declaring collection.
        parent: String,
        /// The entry as written.
        reference: String,
    },

    /// The cache store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The worker pool for a parallel build could not be started.
    #[error("Failed to start build workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Reading a source failed for a reason other than absence.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Map an I/O error on `path`, keeping absence distinguishable.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// Whether this error means a source is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_from_io_not_found() {
        let err = BuildError::from_io("/docs/a.md", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Page not found: /docs/a.md");
    }

    #[test]
    fn test_from_io_other() {
        let err = BuildError::from_io(
            "/docs/a.md",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn test_missing_page_message() {
        let err = BuildError::MissingPage {
            parent: "guide".to_owned(),
            name: "setup".to_owned(),
        };
        assert_eq!(err.to_string(), "Page not found: setup (declared in 'guide')");
    }
}
