//! Page tree data model.
//!
//! A [`Page`] is one node of the documentation tree: either a leaf built from
//! a single Markdown document, or a collection built from a directory
//! (optionally with its own `index.md` content). Children are owned by their
//! parent, in declaration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Front matter variables, in document order.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// In-page navigation: heading slug to heading text, in document order.
pub type Submenu = IndexMap<String, String>;

/// Whether a node came from a file or a directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// A single Markdown document.
    #[default]
    Leaf,
    /// A directory, possibly with index content.
    Collection,
}

/// One node of the documentation tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Identifier from the path segment (file stem or declared identifier for
    /// leaves, directory name for collections; empty for the root).
    pub name: String,
    /// Path relative to the content root: the source file for leaves
    /// (`guide/setup.md`), the directory for collections (`guide`, `""` for
    /// the root).
    pub path: String,
    /// Content revision tag supplied to the build.
    pub version: String,
    /// Display title.
    pub title: String,
    /// Node kind.
    pub kind: PageKind,
    /// Front matter variables; `None` for collections without an index file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Variables>,
    /// Rendered HTML body, without the top-level heading.
    #[serde(default)]
    pub content: String,
    /// Second-level headings, keyed by slug.
    #[serde(default)]
    pub submenu: Submenu,
    /// Child pages in declaration order.
    #[serde(default)]
    pub sub_pages: Vec<Page>,
}

impl Page {
    /// Whether this node represents a directory.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.kind == PageKind::Collection
    }

    /// Look up a front matter variable.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&serde_json::Value> {
        self.variables.as_ref()?.get(key)
    }

    /// Find a direct child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Page> {
        self.sub_pages.iter().find(|p| p.name == name)
    }

    /// Pre-order traversal yielding `(depth, page)`, starting with `self` at
    /// depth 0.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(0, self)],
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn count(&self) -> usize {
        self.walk().count()
    }
}

/// Pre-order iterator over a page subtree. Created by [`Page::walk`].
pub struct Walk<'a> {
    stack: Vec<(usize, &'a Page)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Page);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, page) = self.stack.pop()?;
        self.stack
            .extend(page.sub_pages.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, page))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn leaf(name: &str) -> Page {
        Page {
            name: name.to_owned(),
            path: format!("{name}.md"),
            version: "v1".to_owned(),
            title: name.to_uppercase(),
            variables: Some(Variables::new()),
            ..Page::default()
        }
    }

    fn sample_tree() -> Page {
        let mut submenu = Submenu::new();
        submenu.insert("zeta".to_owned(), "Zeta".to_owned());
        submenu.insert("alpha".to_owned(), "Alpha".to_owned());

        let mut variables = Variables::new();
        variables.insert("pages".to_owned(), json!(["intro", "guide"]));
        variables.insert("draft".to_owned(), json!(false));
        variables.insert("weight".to_owned(), json!(1.5));

        Page {
            name: String::new(),
            path: String::new(),
            version: "v1".to_owned(),
            title: "Home".to_owned(),
            kind: PageKind::Collection,
            variables: Some(variables),
            content: "<p>Welcome</p>\n".to_owned(),
            submenu,
            sub_pages: vec![
                leaf("intro"),
                Page {
                    name: "guide".to_owned(),
                    path: "guide".to_owned(),
                    version: "v1".to_owned(),
                    title: "guide".to_owned(),
                    kind: PageKind::Collection,
                    sub_pages: vec![leaf("setup")],
                    ..Page::default()
                },
            ],
        }
    }

    #[test]
    fn test_serialization_round_trip_preserves_order() {
        let page = sample_tree();

        let json = serde_json::to_vec(&page).unwrap();
        let parsed: Page = serde_json::from_slice(&json).unwrap();

        assert_eq!(parsed, page);
        let submenu_keys: Vec<_> = parsed.submenu.keys().cloned().collect();
        assert_eq!(submenu_keys, vec!["zeta", "alpha"]);
        let var_keys: Vec<_> = parsed.variables.unwrap().keys().cloned().collect();
        assert_eq!(var_keys, vec!["pages", "draft", "weight"]);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let page = sample_tree();
        assert_eq!(
            serde_json::to_string(&page).unwrap(),
            serde_json::to_string(&page.clone()).unwrap()
        );
    }

    #[test]
    fn test_collection_without_index_omits_variables() {
        let page = Page {
            kind: PageKind::Collection,
            ..Page::default()
        };
        let value = serde_json::to_value(&page).unwrap();

        assert!(value.get("variables").is_none());
        assert_eq!(value["kind"], json!("collection"));
        assert_eq!(value["subPages"], json!([]));
    }

    #[test]
    fn test_variable_lookup() {
        let page = sample_tree();
        assert_eq!(page.variable("draft"), Some(&json!(false)));
        assert_eq!(page.variable("missing"), None);
        assert_eq!(Page::default().variable("draft"), None);
    }

    #[test]
    fn test_child_lookup() {
        let page = sample_tree();
        assert_eq!(page.child("guide").map(|p| p.path.as_str()), Some("guide"));
        assert!(page.child("setup").is_none());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let page = sample_tree();
        let visited: Vec<_> = page
            .walk()
            .map(|(depth, p)| (depth, p.name.as_str()))
            .collect();

        assert_eq!(
            visited,
            vec![(0, ""), (1, "intro"), (1, "guide"), (2, "setup")]
        );
        assert_eq!(page.count(), 4);
        assert!(page.is_collection());
        assert!(!page.sub_pages[0].is_collection());
    }
}
