//! Page tree building for folio.
//!
//! Turns a directory of Markdown documents into a [`Page`] tree:
//!
//! - A directory becomes a collection. Its `index.md`, when present,
//!   provides the title, variables and content, and its `pages` front matter
//!   variable lists the children in order. Without an index, children come
//!   from the sorted directory listing.
//! - A `.md` file becomes a leaf with rendered HTML, a title, a submenu of
//!   `<h2>` headings and anchored sub-headings.
//!
//! Every node is cached through a [`folio_cache::Cache`] and rebuilt only
//! when its sources change.
//!
//! # Quick Start
//!
//! ```
//! use folio_cache::NullCache;
//! use folio_site::PageBuilder;
//!
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("index.md"), "---\npages: [intro]\n---\n# Docs\n")?;
//! std::fs::write(dir.path().join("intro.md"), "# Introduction\n## Setup\n")?;
//!
//! let root = PageBuilder::new(&NullCache).build(dir.path(), "v1")?;
//! assert_eq!(root.title, "Docs");
//! let intro = root.child("intro").unwrap();
//! assert_eq!(intro.title, "Introduction");
//! assert_eq!(intro.submenu.get("setup").map(String::as_str), Some("Setup"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod error;
mod front_matter;
mod headings;
mod leaf;
mod listing;
mod markdown;
mod page;
mod resolver;
mod slug;

pub use builder::{
    BuildOptions, BuildReport, Diagnostic, DiagnosticKind, MissingPagePolicy, PageBuilder,
};
pub use error::BuildError;
pub use headings::SubmenuCollision;
pub use markdown::{CmarkRenderer, MarkdownRenderer};
pub use page::{Page, PageKind, Submenu, Variables, Walk};
pub use slug::{DefaultSlugifier, Slugify};
