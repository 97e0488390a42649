//! Plain text rendering
//!
//! Non-content elements are stripped and the rest is rendered by
//! `html2text` at 80 columns: headings keep a `#` prefix per level, list
//! items become bullet or numbered lines and preformatted blocks are kept.

use crate::format::collapse_blank_lines;
use crate::format::html::remove_elements;
use crate::FormatError;

const WRAP_WIDTH: usize = 80;

/// Subtrees that never contribute text
const SKIPPED: &str = "head, script, style, noscript, iframe, template, svg";

#[derive(Debug, Clone, Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn try_convert(&self, body: &str) -> Result<String, FormatError> {
        let content = remove_elements(body, SKIPPED)?;
        let rendered = html2text::from_read(content.as_bytes(), WRAP_WIDTH);
        let text = collapse_blank_lines(&rendered);
        Ok(format!("{}\n", text.trim()))
    }
}
