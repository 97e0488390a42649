//! HTML parser for extracting links, assets and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Same-origin page links to follow
//! - Asset references (images, stylesheets, scripts)
//! - The page title
//! - Navigation sections, for the section listing of the CLI
//!
//! `scraper::Html` is not `Send`, so every function here is synchronous and
//! returns owned data; documents never live across an `.await`.

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::filter::ContentFilter;
use crate::url::{normalize_url, same_origin, AssetKind};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Separators between a page title and the site name, in the order tried
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " — ", " – ", " :: ", " // "];

/// Title used when nothing better can be found
pub const DEFAULT_TITLE: &str = "Documentation";

/// Selectors whose links are treated as documentation sections
const NAV_SELECTORS: &str = "nav a, .sidebar a, .toc a, .menu a, .navigation a, .doc-nav a, \
     .theme-doc-sidebar-item a, .docs-sidebar a";

/// An asset reference found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub url: Url,
    /// Kind implied by the referencing tag
    pub hint: AssetKind,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: String,

    /// Normalized same-origin links that pass the URL filter, first occurrence order
    pub links: Vec<Url>,

    /// Normalized asset references (empty unless requested)
    pub assets: Vec<AssetRef>,
}

impl ParsedPage {
    /// Parses a page body
    ///
    /// # Arguments
    ///
    /// * `body` - The HTML content
    /// * `current` - URL of the page, used to resolve relative references
    /// * `base` - Base URL of the crawl; links must share its origin
    /// * `filter` - URL filter applied to every link
    /// * `with_assets` - Whether asset references are collected
    pub fn parse(
        body: &str,
        current: &Url,
        base: &Url,
        filter: &ContentFilter,
        with_assets: bool,
    ) -> Self {
        let document = Html::parse_document(body);

        let assets = if with_assets {
            extract_assets(&document, current)
        } else {
            Vec::new()
        };

        Self {
            title: extract_title(&document, current),
            links: extract_links(&document, current, base, filter),
            assets,
        }
    }
}

/// Extracts followable page links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags resolving to the crawl's origin
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - fragment-only, `javascript:`, `mailto:`, `tel:` and `data:` references
/// - links rejected by the URL filter
///
/// Duplicates within the page are removed; deduplication against the
/// frontier happens when the links are offered to it.
pub fn extract_links(
    document: &Html,
    current: &Url,
    base: &Url,
    filter: &ContentFilter,
) -> Vec<Url> {
    let Some(selector) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let url = match normalize_url(href, current) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!("Skipping link {:?} on {}: {}", href, current, e);
                continue;
            }
        };

        if !same_origin(&url, base) {
            tracing::trace!("Skipping cross-origin link {}", url);
            continue;
        }

        if !filter.allow_url(url.as_str()) {
            tracing::debug!("Link {} rejected by URL filter", url);
            continue;
        }

        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }

    links
}

/// Extracts asset references from images, stylesheets and scripts
///
/// Assets may live on any origin.
pub fn extract_assets(document: &Html, current: &Url) -> Vec<AssetRef> {
    let sources = [
        ("img[src]", "src", AssetKind::Image),
        ("link[rel~=\"stylesheet\"][href]", "href", AssetKind::Css),
        ("script[src]", "src", AssetKind::Js),
    ];

    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    for (css, attr, hint) in sources {
        let Some(selector) = selector(css) else {
            continue;
        };

        for element in document.select(&selector) {
            let Some(reference) = element.value().attr(attr) else {
                continue;
            };

            if let Ok(url) = normalize_url(reference, current) {
                if seen.insert(url.to_string()) {
                    assets.push(AssetRef { url, hint });
                }
            }
        }
    }

    assets
}

/// Extracts the page title
///
/// Order of preference:
/// 1. `<title>`, cut at the first site-name separator (`" | "`, `" — "`, ...)
/// 2. The first non-empty heading, `h1` through `h6`
/// 3. The last URL path segment, title-cased
/// 4. `"Documentation"`
pub fn extract_title(document: &Html, url: &Url) -> String {
    if let Some(title) = first_text(document, "title") {
        let mut title = title.as_str();
        for separator in TITLE_SEPARATORS {
            if let Some((head, _)) = title.split_once(separator) {
                title = head.trim();
            }
        }
        if !title.is_empty() {
            return title.to_string();
        }
    }

    for level in 1..=6 {
        if let Some(heading) = first_text(document, &format!("h{}", level)) {
            return heading;
        }
    }

    title_from_url(url).unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Human-readable title from the last path segment (`getting-started` → `Getting Started`)
pub fn title_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let segment = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);

    let title = segment
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");

    (!title.is_empty()).then_some(title)
}

/// Maps navigation link texts to absolute URLs
pub fn extract_sections(body: &str, page_url: &Url) -> BTreeMap<String, Url> {
    let document = Html::parse_document(body);
    let mut sections = BTreeMap::new();

    let Some(selector) = selector(NAV_SELECTORS) else {
        return sections;
    };

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let name = element_text(&link);
        if name.is_empty() {
            continue;
        }
        if let Ok(url) = normalize_url(href, page_url) {
            sections.insert(name, url);
        }
    }

    sections
}

/// Fetches a page and lists its documentation sections
///
/// Errors are logged and yield an empty map.
pub async fn discover_sections(fetcher: &Fetcher, url: &Url) -> BTreeMap<String, Url> {
    match fetcher.fetch(url, 0).await {
        FetchResult::Success {
            body, final_url, ..
        } => {
            let sections = extract_sections(&body, &final_url);
            tracing::debug!("Discovered {} documentation sections", sections.len());
            sections
        }
        other => {
            tracing::error!("Error discovering documentation sections: {:?}", other);
            BTreeMap::new()
        }
    }
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .map(|e| element_text(&e))
        .find(|text| !text.is_empty())
}

/// Element text with whitespace runs collapsed
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
