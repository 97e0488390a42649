//! Per-page worker sequence
//!
//! fetch → claim redirect target → content filter → parse → convert → map
//! path → write → enqueue links → hand assets back to the coordinator.
//! Every outcome is recorded in the crawl session; nothing here returns an
//! error.
//!
//! A redirected page is saved under the address it was requested as, while
//! its links resolve against the address it was served from.

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::filter::ContentFilter;
use crate::crawler::frontier::{CrawlTarget, Offer, RedirectClaim};
use crate::crawler::parser::{AssetRef, ParsedPage};
use crate::format::{Formatter, PageLocation};
use crate::output::PageWriter;
use crate::state::{CrawlSession, PageState, SavedPage};
use crate::url::{normalize_absolute, same_origin, PathMapper};
use std::sync::Arc;
use url::Url;

/// Shared, read-only collaborators of the page workers
#[derive(Debug)]
pub struct PipelineContext {
    pub session: Arc<CrawlSession>,
    pub fetcher: Fetcher,
    pub filter: ContentFilter,
    pub formatter: Formatter,
    pub mapper: PathMapper,
    pub pages: PageWriter,
    pub base_url: Url,
    pub include_assets: bool,
}

/// Processes one page
///
/// # Arguments
///
/// * `ctx` - Shared collaborators
/// * `target` - The page and its depth
/// * `lane` - Politeness lane of the calling worker
///
/// # Returns
///
/// Newly claimed assets referenced by the page (empty unless assets are enabled)
pub async fn process(ctx: &PipelineContext, target: CrawlTarget, lane: usize) -> Vec<AssetRef> {
    let CrawlTarget { url, depth } = target;
    let key = url.as_str();
    let session = &ctx.session;

    session.transition(key, PageState::Fetching);

    let (final_url, body) = match ctx.fetcher.fetch(&url, lane).await {
        FetchResult::Success {
            final_url, body, ..
        } => (final_url, body),
        FetchResult::NotFound { status_code } => {
            session.record_failure(key, format!("HTTP {} Not Found", status_code));
            return Vec::new();
        }
        FetchResult::ContentMismatch { content_type } => {
            session.record_filtered(key, &format!("not HTML ({})", content_type));
            return Vec::new();
        }
        FetchResult::Failed { reason, attempts } => {
            session.record_failure(key, format!("{} (after {} attempts)", reason, attempts));
            return Vec::new();
        }
    };

    if final_url != url {
        claim_redirect(ctx, &url, &final_url);
    }

    if !ctx.filter.allow_content(&body) {
        session.record_filtered(key, "content filter");
        return Vec::new();
    }

    let parsed = ParsedPage::parse(
        &body,
        &final_url,
        &ctx.base_url,
        &ctx.filter,
        ctx.include_assets,
    );

    let document = ctx
        .formatter
        .convert(&body, PageLocation::redirected(&url, &final_url));
    let path = ctx.mapper.map(&url);

    match ctx.pages.write_page(&path, &url, &document).await {
        Ok(written) => {
            tracing::info!("Saved {} -> {}", url, written.to_slash_string());
            session.record_saved(SavedPage {
                url: key.to_string(),
                title: parsed.title.clone(),
                path: written.to_slash_string(),
                depth,
            });
        }
        Err(e) => session.record_failure(key, e.to_string()),
    }

    enqueue(session, parsed, depth)
}

/// Keeps the page `url` was redirected to from being crawled a second time
fn claim_redirect(ctx: &PipelineContext, url: &Url, final_url: &Url) {
    let Ok(target) = normalize_absolute(final_url.as_str()) else {
        return;
    };
    if target == *url || !same_origin(&target, &ctx.base_url) {
        return;
    }

    let session = &ctx.session;
    match session.with_frontier(|frontier| frontier.claim_redirect(&target)) {
        RedirectClaim::Claimed => tracing::debug!("{} redirected to {}", url, target),
        RedirectClaim::Dequeued => {
            let key = target.as_str();
            session.transition(key, PageState::Fetching);
            session.record_filtered(key, &format!("redirect target of {}", url));
        }
        RedirectClaim::Seen => {
            tracing::debug!("{} redirected to already crawled {}", url, target)
        }
    }
}

/// Offers the page's links at `depth + 1` and claims its assets
fn enqueue(session: &CrawlSession, parsed: ParsedPage, depth: u32) -> Vec<AssetRef> {
    let next_depth = depth + 1;

    let (enqueued, assets) = session.with_frontier(|frontier| {
        let mut enqueued = Vec::new();
        for link in parsed.links {
            let key = link.to_string();
            match frontier.offer(link, next_depth) {
                Offer::Enqueued => enqueued.push(key),
                Offer::Seen => {}
                Offer::TooDeep => tracing::debug!("Not following {}: depth {}", key, next_depth),
            }
        }

        let assets: Vec<AssetRef> = parsed
            .assets
            .into_iter()
            .filter(|asset| frontier.claim_asset(&asset.url))
            .collect();

        (enqueued, assets)
    });

    if !enqueued.is_empty() {
        tracing::debug!("Enqueued {} new links at depth {}", enqueued.len(), next_depth);
    }
    for url in &enqueued {
        session.transition(url, PageState::Queued);
    }

    assets
}
