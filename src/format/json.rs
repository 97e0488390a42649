//! Structured JSON documents
//!
//! One object per page: source URL, title, `<meta>` values, the heading
//! outline, every link with its classification, the main text and the
//! capture time of the crawl.

use crate::crawler::{element_text, extract_title, selector};
use crate::format::PageLocation;
use crate::url::same_origin;
use crate::FormatError;
use chrono::{DateTime, SecondsFormat, Utc};
use scraper::Html;
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Containers searched for the main text, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    ".content",
    "[role='main']",
    "body",
];

/// Characters of the body kept in a degraded document
const PARTIAL_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
struct JsonDocument {
    url: String,
    title: String,
    metadata: BTreeMap<String, String>,
    headings: Vec<Heading>,
    links: Vec<Link>,
    content: String,
    timestamp: Timestamp,
}

#[derive(Debug, Serialize)]
struct Heading {
    level: u8,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum LinkKind {
    Internal,
    External,
    Relative,
}

#[derive(Debug, Serialize)]
struct Link {
    url: String,
    text: String,
    #[serde(rename = "type")]
    kind: LinkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
}

#[derive(Debug, Serialize)]
struct Timestamp {
    captured: String,
}

#[derive(Debug, Clone)]
pub struct JsonFormatter {
    base_url: Url,
    captured_at: DateTime<Utc>,
}

impl JsonFormatter {
    /// `captured_at` is shared by every document of one crawl
    pub fn new(base_url: Url, captured_at: DateTime<Utc>) -> Self {
        Self {
            base_url,
            captured_at,
        }
    }

    /// Relative links are resolved against the page's post-redirect address
    pub fn try_convert(&self, body: &str, page: PageLocation<'_>) -> Result<String, FormatError> {
        let document = Html::parse_document(body);

        let json = JsonDocument {
            url: page.url.to_string(),
            title: extract_title(&document, page.url),
            metadata: metadata(&document),
            headings: headings(&document),
            links: self.links(&document, page.resolve_against),
            content: main_text(&document),
            timestamp: Timestamp {
                captured: self.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        };

        Ok(serde_json::to_string_pretty(&json)?)
    }

    /// Minimal document written when conversion fails
    pub fn degraded(&self, body: &str, url: &Url, error: &FormatError) -> String {
        let partial: String = body.chars().take(PARTIAL_CONTENT_CHARS).collect();
        let value = serde_json::json!({
            "url": url.as_str(),
            "error": error.to_string(),
            "partial_content": partial,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }

    fn links(&self, document: &Html, current: &Url) -> Vec<Link> {
        let Some(sel) = selector("a[href]") else {
            return Vec::new();
        };

        document
            .select(&sel)
            .filter_map(|a| {
                let href = a.value().attr("href")?.trim();
                if href.is_empty() || href.starts_with('#') {
                    return None;
                }

                let (kind, resolved) = match Url::parse(href) {
                    Ok(absolute) if same_origin(&absolute, &self.base_url) => {
                        (LinkKind::Internal, None)
                    }
                    Ok(_) => (LinkKind::External, None),
                    Err(_) => (
                        LinkKind::Relative,
                        current.join(href).ok().map(|u| u.to_string()),
                    ),
                };

                Some(Link {
                    url: href.to_string(),
                    text: element_text(&a),
                    kind,
                    resolved,
                })
            })
            .collect()
    }
}

fn metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let Some(sel) = selector("meta[content]") else {
        return metadata;
    };

    for meta in document.select(&sel) {
        let element = meta.value();
        let key = element.attr("name").or_else(|| element.attr("property"));
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            metadata
                .entry(key.to_string())
                .or_insert_with(|| content.to_string());
        }
    }

    metadata
}

fn headings(document: &Html) -> Vec<Heading> {
    let Some(sel) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter_map(|h| {
            let level = h.value().name()[1..].parse().ok()?;
            Some(Heading {
                level,
                text: element_text(&h),
                id: h.value().id().map(str::to_string),
            })
        })
        .collect()
}

fn main_text(document: &Html) -> String {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).next().map(|e| element_text(&e)))
        .unwrap_or_default()
}
