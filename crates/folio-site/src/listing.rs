//! Child discovery for collections.
//!
//! A collection's children come either from the `pages` variable of its
//! `index.md` or, when there is no index, from listing the directory.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::BuildError;
use crate::page::Variables;

/// Front matter key listing a collection's children.
const PAGES_KEY: &str = "pages";

/// Markdown source extension.
pub(crate) const MARKDOWN_EXT: &str = "md";

/// One entry of a collection's child list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Reference {
    /// A usable page identifier.
    Page(String),
    /// An entry that cannot name a page, as written by the author.
    Invalid(String),
}

/// Children declared by an index file's `pages` variable.
///
/// Accepts a sequence or a single scalar. Strings and numbers are
/// identifiers; anything else, and identifiers that are not a single visible
/// path segment, become [`Reference::Invalid`]. Repeated identifiers keep their
/// first position.
pub(crate) fn declared_pages(variables: Option<&Variables>) -> Vec<Reference> {
    let items = match variables.and_then(|vars| vars.get(PAGES_KEY)) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item) => vec![item],
    };

    let mut seen = HashSet::new();
    let mut references = Vec::with_capacity(items.len());
    for item in items {
        let id = match item {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                references.push(Reference::Invalid(other.to_string()));
                continue;
            }
        };
        if !is_valid_identifier(&id) {
            references.push(Reference::Invalid(id));
        } else if seen.insert(id.clone()) {
            references.push(Reference::Page(id));
        } else {
            debug!(id = %id, "Ignoring repeated page reference");
        }
    }
    references
}

/// Page identifiers derived from a directory listing.
///
/// Entries are taken in byte-wise name order. Hidden entries are skipped;
/// directories yield their name and `*.md` files their stem. When a
/// directory and a file produce the same identifier, the first one wins.
///
/// # Errors
///
/// Returns `BuildError::NotFound` if `dir` does not exist and
/// `BuildError::Io` if it cannot be read.
pub(crate) fn list_directory(dir: &Path) -> Result<Vec<String>, BuildError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| BuildError::from_io(dir, e))? {
        let entry = entry.map_err(|e| BuildError::from_io(dir, e))?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!(name = ?raw, "Skipping non UTF-8 entry"),
        }
    }
    names.sort_unstable();

    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        if name.starts_with('.') {
            continue;
        }
        let Some(id) = identifier_for(&dir.join(&name), &name) else {
            debug!(name = %name, "Skipping unsupported entry");
            continue;
        };
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Identifier for a listed entry, following symlinks.
fn identifier_for(path: &Path, name: &str) -> Option<String> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.is_dir() {
        return Some(name.to_owned());
    }
    let stem = name.strip_suffix(MARKDOWN_EXT)?.strip_suffix('.')?;
    (metadata.is_file() && !stem.is_empty()).then(|| stem.to_owned())
}

/// Whether `id` names exactly one visible child of a directory.
///
/// Hidden names never name a child: listings and directory stamps skip them.
pub(crate) fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\', '\0'])
}
