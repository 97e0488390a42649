//! Breadth-first frontier with depth and page budgets
//!
//! The frontier owns the work queue, the queued set, the visited set and the
//! addresses other pages redirected to.
//! It is a plain data structure; the crawl session wraps it in a mutex so
//! that every check-then-add happens under one lock.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A page waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Normalized page URL
    pub url: Url,

    /// Link hops from a seed
    pub depth: u32,
}

/// Outcome of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The URL was added to the queue
    Enqueued,
    /// The URL is already queued, in flight or visited
    Seen,
    /// The URL's depth exceeds the maximum depth
    TooDeep,
}

/// Outcome of recording the address a page was redirected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectClaim {
    /// The address was unknown; it will never be handed out
    Claimed,
    /// The address was waiting in the queue and has been taken out of it
    Dequeued,
    /// The address was already handed out or claimed by another redirect
    Seen,
}

/// Work queue plus the sets that guarantee at-most-once visitation
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTarget>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    redirected: HashSet<String>,
    assets: HashSet<String>,
    max_depth: u32,
    max_pages: Option<usize>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Deepest link hop that may be enqueued
    /// * `max_pages` - Maximum number of pages ever handed out, if any
    pub fn new(max_depth: u32, max_pages: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            redirected: HashSet::new(),
            assets: HashSet::new(),
            max_depth,
            max_pages,
        }
    }

    /// Adds a start URL at depth 0
    pub fn seed(&mut self, url: Url) -> Offer {
        self.offer(url, 0)
    }

    /// Offers a discovered URL at `depth`
    ///
    /// The URL must already be normalized. Membership test and insertion
    /// happen in one call, so a URL can be enqueued at most once.
    pub fn offer(&mut self, url: Url, depth: u32) -> Offer {
        if depth > self.max_depth {
            return Offer::TooDeep;
        }

        if self.contains(&url) {
            return Offer::Seen;
        }

        self.queued.insert(url.as_str().to_string());
        self.queue.push_back(CrawlTarget { url, depth });
        Offer::Enqueued
    }

    /// Returns true if `url` is queued, in flight, visited or a redirect target
    pub fn contains(&self, url: &Url) -> bool {
        let key = url.as_str();
        self.visited.contains(key) || self.queued.contains(key) || self.redirected.contains(key)
    }

    /// Records `url` as the target of a redirect
    ///
    /// The address must already be normalized. It does not count against the
    /// page budget.
    pub fn claim_redirect(&mut self, url: &Url) -> RedirectClaim {
        let key = url.as_str();
        if self.visited.contains(key) || self.redirected.contains(key) {
            return RedirectClaim::Seen;
        }

        self.redirected.insert(key.to_string());
        if self.queued.remove(key) {
            self.queue.retain(|target| target.url.as_str() != key);
            RedirectClaim::Dequeued
        } else {
            RedirectClaim::Claimed
        }
    }

    /// Takes up to `limit` targets for the next batch
    ///
    /// The batch never exceeds the remaining page budget. Handed-out targets
    /// move from the queued set to the visited set.
    pub fn next_batch(&mut self, limit: usize) -> Vec<CrawlTarget> {
        let limit = match self.remaining_budget() {
            Some(remaining) => limit.min(remaining),
            None => limit,
        };

        let mut batch = Vec::with_capacity(limit.min(self.queue.len()));
        while batch.len() < limit {
            let Some(target) = self.queue.pop_front() else {
                break;
            };
            let key = target.url.as_str();
            self.queued.remove(key);
            self.visited.insert(key.to_string());
            batch.push(target);
        }

        batch
    }

    /// Claims an asset URL for download
    ///
    /// Returns false if the URL was already claimed or is a known page.
    pub fn claim_asset(&mut self, url: &Url) -> bool {
        if self.contains(url) {
            return false;
        }
        self.assets.insert(url.as_str().to_string())
    }

    /// Pages that may still be handed out, `None` when unlimited
    pub fn remaining_budget(&self) -> Option<usize> {
        self.max_pages
            .map(|max| max.saturating_sub(self.visited.len()))
    }

    /// Returns true once the page budget has been used up
    pub fn budget_exhausted(&self) -> bool {
        self.remaining_budget() == Some(0)
    }

    /// Returns true if no further batch can be produced
    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty() || self.budget_exhausted()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Upper bound on the number of pages this crawl will visit
    pub fn total_estimate(&self) -> usize {
        let known = self.visited.len() + self.queue.len();
        match self.max_pages {
            Some(max) => known.min(max),
            None => known,
        }
    }
}
