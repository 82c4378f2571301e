//! Page tree construction.
//!
//! [`PageBuilder`] walks a content root and produces the [`Page`] tree. Every
//! node goes through the cache resolver: a collection is keyed by its
//! directory and invalidated by any change beneath it, a leaf by its source
//! file. The index document of a collection is cached as its own leaf.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use folio_cache::{Cache, CacheKey, Resource};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::headings::SubmenuCollision;
use crate::leaf::LeafRenderer;
use crate::listing::{self, MARKDOWN_EXT, Reference};
use crate::markdown::{CmarkRenderer, MarkdownRenderer};
use crate::page::{Page, PageKind};
use crate::resolver::CacheResolver;
use crate::slug::{DefaultSlugifier, Slugify};

/// File defining a collection's own content and child order.
const INDEX_FILE: &str = "index.md";

/// What to do when a declared child cannot be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPagePolicy {
    /// Record a diagnostic and leave the child out of the tree.
    #[default]
    Skip,
    /// Abort the build.
    Fail,
}

/// Build configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Handling of dangling and invalid child references.
    pub missing_pages: MissingPagePolicy,
    /// Handling of duplicate `<h2>` slugs within one page.
    pub submenu_collisions: SubmenuCollision,
    /// Resolve siblings concurrently.
    pub parallel: bool,
    /// Worker count for parallel builds; 0 uses one per CPU.
    pub threads: usize,
}

/// Kind of problem found while building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// No directory or `.md` file exists for a declared identifier.
    MissingPage,
    /// A declared entry is not a usable identifier.
    InvalidReference,
}

/// A non-fatal problem recorded under [`MissingPagePolicy::Skip`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Diagnostic {
    /// Logical path of the collection declaring the child.
    pub parent: String,
    /// The child reference as declared.
    pub reference: String,
    /// What went wrong.
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::MissingPage => {
                write!(f, "Page not found: {}", join(&self.parent, &self.reference))
            }
            DiagnosticKind::InvalidReference => write!(
                f,
                "Invalid page reference '{}' in '{}'",
                self.reference, self.parent
            ),
        }
    }
}

/// Result of [`PageBuilder::build_report`].
#[derive(Debug)]
pub struct BuildReport {
    /// Root of the tree.
    pub page: Page,
    /// Problems found in nodes rebuilt by this call. Nodes served from the
    /// cache report nothing.
    pub diagnostics: Vec<Diagnostic>,
    /// Logical paths rebuilt from source, sorted. Collections appear under
    /// their directory path (`""` for the root).
    pub rebuilt: Vec<String>,
    /// Number of nodes served from the cache.
    pub cache_hits: usize,
}

/// Builds page trees from Markdown directories.
///
/// # Example
///
/// ```no_run
/// use folio_cache::NullCache;
/// use folio_site::PageBuilder;
///
/// let builder = PageBuilder::new(&NullCache);
/// let root = builder.build("docs", "v1")?;
/// for (depth, page) in root.walk() {
///     println!("{}{}", "  ".repeat(depth), page.title);
/// }
/// # Ok::<(), folio_site::BuildError>(())
/// ```
pub struct PageBuilder {
    resolver: CacheResolver,
    renderer: Box<dyn MarkdownRenderer>,
    slugifier: Box<dyn Slugify>,
    options: BuildOptions,
}

impl PageBuilder {
    /// Create a builder storing nodes in `cache` with default options.
    #[must_use]
    pub fn new(cache: &dyn Cache) -> Self {
        Self {
            resolver: CacheResolver::new(cache),
            renderer: Box::new(CmarkRenderer::new()),
            slugifier: Box::new(DefaultSlugifier),
            options: BuildOptions::default(),
        }
    }

    /// Set build options.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the Markdown renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replace the slugifier used for anchors and submenu keys.
    #[must_use]
    pub fn with_slugifier(mut self, slugifier: impl Slugify + 'static) -> Self {
        self.slugifier = Box::new(slugifier);
        self
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the tree rooted at `root` for content revision `version`.
    ///
    /// # Errors
    ///
    /// See [`PageBuilder::build_report`].
    pub fn build(&self, root: impl AsRef<Path>, version: &str) -> Result<Page, BuildError> {
        self.build_report(root, version).map(|report| report.page)
    }

    /// Build the tree and report what happened.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if `root` is not an existing
    /// directory, `BuildError::MissingPage` / `BuildError::InvalidReference`
    /// under [`MissingPagePolicy::Fail`], and any front matter, cache or I/O
    /// error met along the way.
    pub fn build_report(&self, root: impl AsRef<Path>, version: &str) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| BuildError::from_io(root, e))?;

        let session = BuildSession::new(self, root.clone(), version);
        let page = if self.options.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .build()?;
            pool.install(|| session.resolve_collection(""))?
        } else {
            session.resolve_collection("")?
        };

        let report = session.finish(page);
        info!(
            root = %root.display(),
            version,
            pages = report.page.count(),
            rebuilt = report.rebuilt.len(),
            cache_hits = report.cache_hits,
            diagnostics = report.diagnostics.len(),
            elapsed_ms = elapsed_ms(start),
            "Page tree built"
        );
        Ok(report)
    }
}

/// Convert Duration to milliseconds as f64.
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// State of one `build` call.
struct BuildSession<'a> {
    builder: &'a PageBuilder,
    root: PathBuf,
    root_key: String,
    version: &'a str,
    diagnostics: Mutex<Vec<Diagnostic>>,
    rebuilt: Mutex<Vec<String>>,
    cache_hits: AtomicUsize,
}

impl<'a> BuildSession<'a> {
    fn new(builder: &'a PageBuilder, root: PathBuf, version: &'a str) -> Self {
        let root_key = root.to_string_lossy().into_owned();
        Self {
            builder,
            root,
            root_key,
            version,
            diagnostics: Mutex::new(Vec::new()),
            rebuilt: Mutex::new(Vec::new()),
            cache_hits: AtomicUsize::new(0),
        }
    }

    fn finish(self, page: Page) -> BuildReport {
        let mut diagnostics = self
            .diagnostics
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        diagnostics.sort();
        let mut rebuilt = self.rebuilt.into_inner().unwrap_or_else(PoisonError::into_inner);
        rebuilt.sort();
        BuildReport {
            page,
            diagnostics,
            rebuilt,
            cache_hits: self.cache_hits.into_inner(),
        }
    }

    fn key(&self, kind: PageKind, path: &str) -> CacheKey {
        let tag = match kind {
            PageKind::Leaf => "page",
            PageKind::Collection => "collection",
        };
        CacheKey::from_parts(&[&self.root_key, tag, path, self.version])
    }

    fn source(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    fn record(&self, path: &str, from_cache: bool) {
        if from_cache {
            debug!(path, "Cache hit");
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!(path, "Rebuilt from source");
            self.rebuilt
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(path.to_owned());
        }
    }

    fn resolve_collection(&self, dir: &str) -> Result<Page, BuildError> {
        let key = self.key(PageKind::Collection, dir);
        let resource = Resource::directory(self.source(dir));
        let resolution = self
            .builder
            .resolver
            .resolve(&key, &resource, || self.build_collection(dir))?;
        self.record(dir, resolution.from_cache);
        Ok(resolution.page)
    }

    fn resolve_leaf(&self, file: &str) -> Result<Page, BuildError> {
        let key = self.key(PageKind::Leaf, file);
        let source = self.source(file);
        let resource = Resource::file(&source);
        let leaf = LeafRenderer {
            markdown: self.builder.renderer.as_ref(),
            slugifier: self.builder.slugifier.as_ref(),
            collisions: self.builder.options.submenu_collisions,
        };
        let resolution = self
            .builder
            .resolver
            .resolve(&key, &resource, || leaf.build(&source, file, self.version))?;
        self.record(file, resolution.from_cache);
        Ok(resolution.page)
    }

    fn build_collection(&self, dir: &str) -> Result<Page, BuildError> {
        let (mut page, references) = match self.resolve_leaf(&join(dir, INDEX_FILE)) {
            Ok(index) => {
                let references = listing::declared_pages(index.variables.as_ref());
                (index, references)
            }
            Err(e) if e.is_not_found() => {
                let ids = listing::list_directory(&self.source(dir))?;
                let page = Page {
                    title: dir.to_owned(),
                    ..Page::default()
                };
                (page, ids.into_iter().map(Reference::Page).collect())
            }
            Err(e) => return Err(e),
        };

        page.name = dir.rsplit('/').next().unwrap_or_default().to_owned();
        page.path = dir.to_owned();
        page.version = self.version.to_owned();
        page.kind = PageKind::Collection;
        page.sub_pages = self.build_children(dir, &references)?;
        Ok(page)
    }

    fn build_children(&self, dir: &str, references: &[Reference]) -> Result<Vec<Page>, BuildError> {
        let children: Vec<Option<Page>> = if self.builder.options.parallel {
            references
                .par_iter()
                .map(|r| self.build_child(dir, r))
                .collect::<Result<_, _>>()?
        } else {
            references
                .iter()
                .map(|r| self.build_child(dir, r))
                .collect::<Result<_, _>>()?
        };
        Ok(children.into_iter().flatten().collect())
    }

    /// Resolve one declared child. A directory wins over a `.md` file of the
    /// same name.
    fn build_child(&self, dir: &str, reference: &Reference) -> Result<Option<Page>, BuildError> {
        let name = match reference {
            Reference::Page(name) => name,
            Reference::Invalid(raw) => {
                return self.unresolved(dir, raw, DiagnosticKind::InvalidReference);
            }
        };

        let path = join(dir, name);
        let source = self.source(&path);
        let resolved = if source.is_dir() {
            if self.links_to_ancestor(dir, &source) {
                return self.unresolved(dir, name, DiagnosticKind::InvalidReference);
            }
            self.resolve_collection(&path)
        } else {
            let file = format!("{path}.{MARKDOWN_EXT}");
            if !self.source(&file).is_file() {
                return self.unresolved(dir, name, DiagnosticKind::MissingPage);
            }
            self.resolve_leaf(&file).map(|mut page| {
                page.name.clone_from(name);
                page
            })
        };

        match resolved {
            Ok(page) => Ok(Some(page)),
            // Removed between the existence check and the read
            Err(e) if e.is_not_found() => self.unresolved(dir, name, DiagnosticKind::MissingPage),
            Err(e) => Err(e),
        }
    }

    /// Whether the child directory `target` resolves to `dir` itself or one
    /// of its ancestors, as a symlink loop does.
    fn links_to_ancestor(&self, dir: &str, target: &Path) -> bool {
        match (target.canonicalize(), self.source(dir).canonicalize()) {
            (Ok(target), Ok(parent)) => parent.starts_with(target),
            _ => false,
        }
    }

    fn unresolved(&self, dir: &str, reference: &str, kind: DiagnosticKind) -> Result<Option<Page>, BuildError> {
        let parent = dir.to_owned();
        let reference = reference.to_owned();
        match self.builder.options.missing_pages {
            MissingPagePolicy::Fail => Err(match kind {
                DiagnosticKind::MissingPage => BuildError::MissingPage {
                    parent,
                    name: reference,
                },
                DiagnosticKind::InvalidReference => BuildError::InvalidReference { parent, reference },
            }),
            MissingPagePolicy::Skip => {
                let diagnostic = Diagnostic {
                    parent,
                    reference,
                    kind,
                };
                warn!(parent = %diagnostic.parent, "{diagnostic}");
                self.diagnostics
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(diagnostic);
                Ok(None)
            }
        }
    }
}

/// Join logical path segments with `/`.
fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}
