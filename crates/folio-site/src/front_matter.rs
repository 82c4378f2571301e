//! Front matter splitting.
//!
//! A document whose text begins with `---` is split on that delimiter into
//! exactly three parts: the (empty) prefix, the YAML block and the body.

use crate::page::Variables;

/// Error type for front matter parsing.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FrontMatterError {
    /// YAML parsing error.
    #[error("{0}")]
    Parse(String),
}

/// A document separated into variables and Markdown body.
#[derive(Debug, PartialEq)]
pub(crate) struct FrontMatter<'a> {
    /// Parsed variables; `None` when the document has no front matter block.
    pub(crate) variables: Option<Variables>,
    /// Markdown body following the block (the whole document when there is
    /// no block).
    pub(crate) body: &'a str,
}

/// Split a document into front matter variables and body.
///
/// A leading `---` without a closing delimiter is not front matter; the
/// whole document is returned as body. An empty block yields empty
/// variables.
///
/// # Errors
///
/// Returns an error if the block is malformed YAML or not a mapping.
pub(crate) fn split(document: &str) -> Result<FrontMatter<'_>, FrontMatterError> {
    const DELIMITER: &str = "---";

    let no_front_matter = FrontMatter {
        variables: None,
        body: document,
    };
    if !document.starts_with(DELIMITER) {
        return Ok(no_front_matter);
    }

    let mut parts = document.splitn(3, DELIMITER).skip(1);
    let (Some(yaml), Some(body)) = (parts.next(), parts.next()) else {
        return Ok(no_front_matter);
    };

    Ok(FrontMatter {
        variables: Some(parse_variables(yaml)?),
        body,
    })
}

fn parse_variables(yaml: &str) -> Result<Variables, FrontMatterError> {
    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return Ok(Variables::new());
    }

    serde_yaml::from_str(trimmed).map_err(|e| FrontMatterError::Parse(format!("Invalid YAML: {e}")))
}
