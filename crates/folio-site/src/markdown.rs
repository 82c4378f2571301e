//! Markdown rendering capability.

use pulldown_cmark::{Options, Parser, html};

/// Converts Markdown text into HTML.
///
/// The heading post-processor expects headings rendered as bare
/// `<hN>...</hN>` elements (no attributes).
pub trait MarkdownRenderer: Send + Sync {
    /// Render `markdown` to HTML.
    fn render(&self, markdown: &str) -> String;
}

/// [`MarkdownRenderer`] backed by pulldown-cmark.
#[derive(Clone, Debug)]
pub struct CmarkRenderer {
    gfm: bool,
}

impl CmarkRenderer {
    /// Create a renderer with GitHub Flavored Markdown extensions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self { gfm: true }
    }

    /// Enable GitHub Flavored Markdown extensions (tables, strikethrough,
    /// task lists, footnotes, alerts).
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    /// Parser options for the current configuration.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.gfm {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_FOOTNOTES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
            options.insert(Options::ENABLE_GFM);
        }
        options
    }
}

impl Default for CmarkRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.parser_options());
        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_headings_without_attributes() {
        let html = CmarkRenderer::new().render("# Title\n## Sub");
        assert_eq!(html, "<h1>Title</h1>\n<h2>Sub</h2>\n");
    }

    #[test]
    fn test_render_table_with_gfm() {
        let html = CmarkRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_table_without_gfm() {
        let html = CmarkRenderer::new()
            .with_gfm(false)
            .render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_render_fenced_code() {
        let html = CmarkRenderer::new().render("```rust\nfn main() {}\n```");
        assert!(html.contains(r#"<code class="language-rust">"#));
        assert!(html.contains("fn main() {}"));
    }
}
