//! Heading post-processing of rendered HTML.
//!
//! Extracts the page title from the first `<h1>`, removes top-level headings
//! from the body (templates render the title separately), builds the submenu
//! from `<h2>` headings and adds anchor links to `<h2>`-`<h4>`.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::page::Submenu;
use crate::slug::Slugify;

static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1>(.*?)</h1>\n?").unwrap());
static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h2>(.*?)</h2>").unwrap());
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h([234])>(.*?)</h([234])>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Which heading wins when two `<h2>` headings produce the same slug.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmenuCollision {
    /// The later heading's text replaces the earlier one, keeping the
    /// earlier position.
    #[default]
    LastWins,
    /// The first heading is kept; later duplicates are ignored.
    FirstWins,
}

/// Result of post-processing rendered HTML.
#[derive(Debug, PartialEq)]
pub(crate) struct ProcessedHtml {
    /// Text of the first `<h1>`, if any.
    pub(crate) title: Option<String>,
    /// Body without `<h1>` elements, with anchored sub-headings.
    pub(crate) content: String,
    /// `<h2>` headings keyed by slug.
    pub(crate) submenu: Submenu,
}

/// Post-process rendered HTML.
pub(crate) fn process(html: &str, slugifier: &dyn Slugify, collisions: SubmenuCollision) -> ProcessedHtml {
    let title = H1_RE
        .captures(html)
        .map(|caps| heading_text(&caps[1]))
        .filter(|t| !t.is_empty());

    let content = H1_RE.replace_all(html, "");

    let mut submenu = Submenu::new();
    for caps in H2_RE.captures_iter(&content) {
        let text = heading_text(&caps[1]);
        let slug = slugifier.slugify(&text);
        match collisions {
            SubmenuCollision::LastWins => {
                submenu.insert(slug, text);
            }
            SubmenuCollision::FirstWins => {
                submenu.entry(slug).or_insert(text);
            }
        }
    }

    let content = markup_anchors(&content, slugifier);

    ProcessedHtml {
        title,
        content,
        submenu,
    }
}

/// Give `<h2>`, `<h3>` and `<h4>` an `id` and a trailing self-link.
fn markup_anchors(html: &str, slugifier: &dyn Slugify) -> String {
    ANCHOR_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let (level, inner) = (&caps[1], &caps[2]);
            if level != &caps[3] {
                return caps[0].to_owned();
            }
            let id = slugifier.slugify(&heading_text(inner));
            format!(r##"<h{level} id="{id}">{inner}<a href="#{id}" class="anchor">¶</a></h{level}>"##)
        })
        .into_owned()
}

/// Plain text of a heading's inner HTML: tags stripped, basic entities
/// decoded, whitespace trimmed.
fn heading_text(inner: &str) -> String {
    let stripped = TAG_RE.replace_all(inner, "");
    stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_owned()
}
