//! Output formatters
//!
//! A [`Formatter`] turns a fetched HTML body into the saved document. The
//! set of formats is closed: Markdown, cleaned HTML, plain text and JSON.
//! Conversion never fails from the caller's point of view; when a formatter
//! errors or panics the page degrades to plain text (JSON degrades to a
//! minimal error document) and a warning is logged.

mod html;
mod json;
mod links;
mod markdown;
mod text;

pub use html::{HtmlFormatter, HtmlOptions};
pub use json::JsonFormatter;
pub use links::LinkRewriter;
pub use markdown::MarkdownFormatter;
pub use text::TextFormatter;

use crate::config::{LinkMode, OutputConfig, OutputFormat};
use crate::FormatError;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use url::Url;

/// Settings shared by the formatters of one crawl
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Base URL of the crawl; decides which links are local
    pub base_url: Url,

    /// Capture time written into JSON documents
    pub captured_at: DateTime<Utc>,

    pub clean_html: bool,
    pub remove_scripts: bool,
    pub html_links: LinkMode,
}

impl FormatterConfig {
    /// Default settings, captured now
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            captured_at: Utc::now(),
            clean_html: true,
            remove_scripts: true,
            html_links: LinkMode::default(),
        }
    }

    pub fn from_output(base_url: Url, output: &OutputConfig, captured_at: DateTime<Utc>) -> Self {
        Self {
            base_url,
            captured_at,
            clean_html: output.clean_html,
            remove_scripts: output.remove_scripts,
            html_links: output.html_links,
        }
    }
}

/// Addresses of a page being converted
///
/// `url` is the address the page was requested as and names its saved
/// file. Relative references resolve against `resolve_against`, the address
/// the server finally answered from.
#[derive(Debug, Clone, Copy)]
pub struct PageLocation<'a> {
    pub url: &'a Url,
    pub resolve_against: &'a Url,
}

impl<'a> PageLocation<'a> {
    /// A page served from the address it was requested as
    pub fn new(url: &'a Url) -> Self {
        Self {
            url,
            resolve_against: url,
        }
    }

    /// A page requested as `url` and answered from `final_url`
    pub fn redirected(url: &'a Url, final_url: &'a Url) -> Self {
        Self {
            url,
            resolve_against: final_url,
        }
    }
}

/// Description of a formatter, as listed by `--list-formats`
#[derive(Debug, Clone, Serialize)]
pub struct FormatterMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub features: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Formatter {
    Markdown(MarkdownFormatter),
    Html(HtmlFormatter),
    Text(TextFormatter),
    Json(JsonFormatter),
}

impl Formatter {
    /// Creates the formatter for `format`
    ///
    /// # Arguments
    ///
    /// * `format` - The output format
    /// * `config` - Base URL, capture time and HTML options
    pub fn new(format: OutputFormat, config: FormatterConfig) -> Self {
        let extension = extension_of(format);
        let links = LinkRewriter::new(config.base_url.clone(), extension);

        match format {
            OutputFormat::Markdown => Self::Markdown(MarkdownFormatter::new(links)),
            OutputFormat::Html => Self::Html(HtmlFormatter::new(
                HtmlOptions {
                    clean: config.clean_html,
                    remove_scripts: config.remove_scripts,
                    links: config.html_links,
                },
                links,
            )),
            OutputFormat::Text => Self::Text(TextFormatter::new()),
            OutputFormat::Json => Self::Json(JsonFormatter::new(config.base_url, config.captured_at)),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Markdown(_) => OutputFormat::Markdown,
            Self::Html(_) => OutputFormat::Html,
            Self::Text(_) => OutputFormat::Text,
            Self::Json(_) => OutputFormat::Json,
        }
    }

    /// File extension of saved documents, without the dot
    pub fn extension(&self) -> &'static str {
        extension_of(self.format())
    }

    /// Converts a page body; never fails
    ///
    /// Identical input yields identical output.
    pub fn convert(&self, body: &str, page: PageLocation<'_>) -> String {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.try_convert(body, page)));

        let error = match attempt {
            Ok(Ok(document)) => return document,
            Ok(Err(error)) => error,
            Err(_) => FormatError::Panicked,
        };

        tracing::warn!(
            "{} conversion failed for {}: {}; saving plain text",
            self.format(),
            page.url,
            error
        );

        match self {
            Self::Json(json) => json.degraded(body, page.url, &error),
            _ => plain_text(body),
        }
    }

    /// Fallible conversion, without the plain text fallback
    pub fn try_convert(&self, body: &str, page: PageLocation<'_>) -> Result<String, FormatError> {
        match self {
            Self::Markdown(f) => f.try_convert(body, page),
            Self::Html(f) => f.try_convert(body, page),
            Self::Text(f) => f.try_convert(body),
            Self::Json(f) => f.try_convert(body, page),
        }
    }

    pub fn metadata(&self) -> FormatterMetadata {
        let mut meta = metadata_of(self.format());
        if let Self::Html(f) = self {
            let options = f.options();
            meta.features = vec![
                format!("clean: {}", options.clean),
                format!("remove_scripts: {}", options.remove_scripts),
                format!("links: {}", options.links),
            ];
        }
        meta
    }
}

/// Metadata of every format, in listing order
pub fn all_metadata() -> Vec<FormatterMetadata> {
    OutputFormat::ALL.iter().map(|f| metadata_of(*f)).collect()
}

fn extension_of(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => "md",
        OutputFormat::Html => "html",
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
    }
}

fn metadata_of(format: OutputFormat) -> FormatterMetadata {
    let (description, mime_type, features): (_, _, &[&str]) = match format {
        OutputFormat::Markdown => (
            "Markdown with YAML front matter and local links",
            "text/markdown",
            &["front_matter", "code_languages", "local_links"],
        ),
        OutputFormat::Html => (
            "Cleaned HTML with scripts removed",
            "text/html",
            &["clean", "remove_scripts", "links"],
        ),
        OutputFormat::Text => (
            "Plain text wrapped at 80 columns",
            "text/plain",
            &["headings", "lists", "wrapping"],
        ),
        OutputFormat::Json => (
            "Structured JSON with metadata, headings and links",
            "application/json",
            &["metadata", "headings", "links", "content"],
        ),
    };

    FormatterMetadata {
        name: format.as_str(),
        description,
        extension: extension_of(format),
        mime_type,
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

/// Text content of a document, whitespace collapsed; the last-resort output
pub fn plain_text(body: &str) -> String {
    let document = Html::parse_document(body);
    let text = document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}\n", text)
}

/// Collapses runs of three or more newlines into one blank line
pub(crate) fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }

    out
}
