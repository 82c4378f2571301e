//! Slug generation for heading anchors and submenu keys.

use std::fmt::Write;

/// Turns arbitrary text into a URL-safe identifier.
pub trait Slugify: Send + Sync {
    /// Produce the slug for `text`. Must be deterministic.
    fn slugify(&self, text: &str) -> String;
}

/// Prefix of slugs for text with no transliterable letters or digits.
const FALLBACK_PREFIX: &str = "section";

/// Lowercase ASCII slugifier.
///
/// Text is transliterated to ASCII first, so `Café` becomes `cafe`. ASCII
/// letters and digits are kept lowercased; every run of other characters
/// becomes a single `-`; leading and trailing dashes are trimmed. Text left
/// with nothing to keep maps to `section-` followed by its code points in
/// hex, so distinct headings keep distinct slugs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSlugifier;

impl Slugify for DefaultSlugifier {
    fn slugify(&self, text: &str) -> String {
        let ascii = deunicode::deunicode(text);
        let mut result = String::with_capacity(ascii.len());
        let mut pending_dash = false;

        for c in ascii.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !result.is_empty() {
                    result.push('-');
                }
                pending_dash = false;
                result.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if result.is_empty() {
            return fallback(text.trim());
        }
        result
    }
}

fn fallback(text: &str) -> String {
    let mut slug = FALLBACK_PREFIX.to_owned();
    for c in text.chars() {
        let _ = write!(slug, "-{:x}", u32::from(c));
    }
    slug
}
