//! Leaf construction: one Markdown document to one [`Page`].

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::BuildError;
use crate::front_matter;
use crate::headings::{self, SubmenuCollision};
use crate::markdown::MarkdownRenderer;
use crate::page::{Page, PageKind, Variables};
use crate::slug::Slugify;

/// Front matter key holding an explicit title.
const TITLE_KEY: &str = "title";

/// Capabilities used to turn a document into a page.
pub(crate) struct LeafRenderer<'a> {
    pub markdown: &'a dyn MarkdownRenderer,
    pub slugifier: &'a dyn Slugify,
    pub collisions: SubmenuCollision,
}

impl LeafRenderer<'_> {
    /// Read `source` and build the leaf stored at logical `path`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the file cannot be found,
    /// `BuildError::FrontMatter` for malformed front matter and
    /// `BuildError::Io` for other read failures.
    pub(crate) fn build(&self, source: &Path, path: &str, version: &str) -> Result<Page, BuildError> {
        let document = fs::read_to_string(source).map_err(|e| BuildError::from_io(source, e))?;
        self.render(&document, path, version)
    }

    /// Build a leaf from document text.
    pub(crate) fn render(&self, document: &str, path: &str, version: &str) -> Result<Page, BuildError> {
        let split = front_matter::split(document).map_err(|e| BuildError::FrontMatter {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        let html = self.markdown.render(split.body);
        let processed = headings::process(&html, self.slugifier, self.collisions);

        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_owned();
        let title = explicit_title(split.variables.as_ref())
            .or(processed.title)
            .unwrap_or_else(|| stem.clone());

        Ok(Page {
            name: stem,
            path: path.to_owned(),
            version: version.to_owned(),
            title,
            kind: PageKind::Leaf,
            variables: Some(split.variables.unwrap_or_default()),
            content: processed.content,
            submenu: processed.submenu,
            sub_pages: Vec::new(),
        })
    }
}

fn explicit_title(variables: Option<&Variables>) -> Option<String> {
    match variables?.get(TITLE_KEY)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::markdown::CmarkRenderer;
    use crate::slug::DefaultSlugifier;

    fn render(document: &str, path: &str) -> Page {
        let leaf = LeafRenderer {
            markdown: &CmarkRenderer::new(),
            slugifier: &DefaultSlugifier,
            collisions: SubmenuCollision::LastWins,
        };
        leaf.render(document, path, "v1").unwrap()
    }

    #[test]
    fn test_leaf_with_front_matter() {
        let page = render("---\nkey: val\n---\n# Title\n## Sub", "intro.md");

        assert_eq!(page.variable("key"), Some(&json!("val")));
        assert_eq!(page.title, "Title");
        assert!(!page.content.contains("<h1>"));
        assert_eq!(
            page.content,
            "<h2 id=\"sub\">Sub<a href=\"#sub\" class=\"anchor\">¶</a></h2>\n"
        );
        assert_eq!(page.submenu.get("sub"), Some(&"Sub".to_owned()));
        assert_eq!(page.submenu.len(), 1);
        assert_eq!(page.version, "v1");
        assert_eq!(page.path, "intro.md");
        assert_eq!(page.name, "intro");
        assert_eq!(page.kind, PageKind::Leaf);
    }

    #[test]
    fn test_front_matter_title_wins() {
        let page = render("---\ntitle: Custom\n---\n# Heading\n", "a.md");
        assert_eq!(page.title, "Custom");
    }

    #[test]
    fn test_non_string_title_is_ignored() {
        let page = render("---\ntitle: [a, b]\n---\n# Heading\n", "a.md");
        assert_eq!(page.title, "Heading");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let page = render("Just text.\n", "guide/setup.md");
        assert_eq!(page.title, "setup");
        assert_eq!(page.name, "setup");
    }

    #[test]
    fn test_no_front_matter_gives_empty_variables() {
        let page = render("# A\n", "a.md");
        assert_eq!(page.variables, Some(Variables::new()));
    }

    #[test]
    fn test_invalid_front_matter() {
        let leaf = LeafRenderer {
            markdown: &CmarkRenderer::new(),
            slugifier: &DefaultSlugifier,
            collisions: SubmenuCollision::LastWins,
        };
        let err = leaf
            .render("---\ntitle: [oops\n---\nBody", "bad.md", "v1")
            .unwrap_err();
        assert!(matches!(err, BuildError::FrontMatter { ref path, .. } if path == "bad.md"));
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let leaf = LeafRenderer {
            markdown: &CmarkRenderer::new(),
            slugifier: &DefaultSlugifier,
            collisions: SubmenuCollision::LastWins,
        };
        let err = leaf
            .build(&tmp.path().join("gone.md"), "gone.md", "v1")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
