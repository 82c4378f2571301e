//! `folio build` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use folio_cache::{Cache, FileCache, NullCache};
use folio_config::{CliSettings, Config};
use folio_site::{MissingPagePolicy, Page, PageBuilder};

use crate::error::CliError;
use crate::output::Output;

/// Cache format tag; a new release invalidates caches written by older ones.
const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Markdown source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Content revision tag stamped on every page (overrides config).
    #[arg(short, long, env = "FOLIO_REVISION")]
    revision: Option<String>,

    /// Disable caching.
    #[arg(long)]
    no_cache: bool,

    /// Fail on dangling page references instead of skipping them.
    #[arg(long)]
    strict: bool,

    /// Build sibling pages in parallel.
    #[arg(long)]
    parallel: bool,

    /// Print the page tree as JSON instead of an outline.
    #[arg(long)]
    json: bool,

    /// Enable verbose output (cache and timing logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the build fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            cache_enabled: self.no_cache.then_some(false),
            version: self.revision,
            missing_pages: self.strict.then_some(MissingPagePolicy::Fail),
            parallel: self.parallel.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let docs = &config.docs_resolved;

        output.info(&format!("Source directory: {}", docs.source_dir.display()));
        let cache: Box<dyn Cache> = if docs.cache_enabled {
            output.info(&format!("Cache directory: {}", docs.cache_dir.display()));
            let cache = FileCache::new(docs.cache_dir.clone(), CACHE_VERSION);
            ensure_gitignore(cache.root());
            Box::new(cache)
        } else {
            output.info("Cache: disabled");
            Box::new(NullCache)
        };

        let builder = PageBuilder::new(cache.as_ref()).with_options(config.build.options());
        let report = builder.build_report(&docs.source_dir, &config.build.version)?;

        if self.json {
            output.data(&serde_json::to_string_pretty(&report.page)?)?;
        } else {
            for row in outline(&report.page) {
                output.outline_row(&row.indent, &row.title, &row.path, row.collection);
            }
        }

        if !report.diagnostics.is_empty() {
            output.separator();
            for diagnostic in &report.diagnostics {
                output.warning(&format!("Warning: {diagnostic}"));
            }
        }

        output.success(&format!(
            "Built {} pages for {} ({} rebuilt, {} from cache)",
            report.page.count(),
            config.build.version,
            report.rebuilt.len(),
            report.cache_hits,
        ));
        Ok(())
    }
}

/// One line of the printed tree.
#[derive(Debug, PartialEq)]
struct OutlineRow {
    indent: String,
    title: String,
    path: String,
    collection: bool,
}

fn outline(root: &Page) -> Vec<OutlineRow> {
    root.walk()
        .map(|(depth, page)| OutlineRow {
            indent: "  ".repeat(depth),
            title: if page.title.is_empty() {
                "(untitled)".to_owned()
            } else {
                page.title.clone()
            },
            path: if page.path.is_empty() {
                "/".to_owned()
            } else {
                page.path.clone()
            },
            collection: page.is_collection(),
        })
        .collect()
}

/// Keep the cache out of version control.
fn ensure_gitignore(cache_dir: &Path) {
    let gitignore_path = cache_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by folio\n*\n");
    }
}
