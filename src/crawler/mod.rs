//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry, backoff and per-worker politeness delays
//! - HTML parsing and link/asset extraction
//! - The frontier that deduplicates URLs and enforces depth and page limits
//! - Overall crawl coordination in batches

mod assets;
mod coordinator;
mod fetcher;
mod filter;
mod frontier;
mod parser;
mod pipeline;
mod politeness;
mod retry;

pub use coordinator::{run_crawl, Coordinator, CrawlOutcome, ProgressCallback, StopHandle};
pub use fetcher::{build_http_client, is_html_content_type, FetchResult, Fetcher};
pub use filter::{is_denylisted, ContentFilter};
pub use frontier::{CrawlTarget, Frontier, Offer, RedirectClaim};
pub use parser::{
    discover_sections, extract_assets, extract_links, extract_sections, extract_title,
    title_from_url, AssetRef, ParsedPage, DEFAULT_TITLE,
};
pub use politeness::Politeness;
pub use retry::{retry, Exhausted, RetryDecision, RetryPolicy};

pub(crate) use parser::{element_text, selector};

use crate::config::Config;
use crate::MirrorError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and create the output directory
/// 2. Build the HTTP client and the formatter
/// 3. Crawl the site in batches, following in-domain links
/// 4. Download assets if enabled
/// 5. Write the index and the report
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok((pages, assets))` - Number of pages and assets written
/// * `Err(MirrorError)` - The configuration was rejected
pub async fn crawl(config: Config) -> Result<(usize, usize), MirrorError> {
    let outcome = run_crawl(config).await?;
    Ok((outcome.pages_downloaded, outcome.assets_downloaded))
}
