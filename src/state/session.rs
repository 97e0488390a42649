//! Crawl session: the shared state of one crawl run
//!
//! Every worker holds an `Arc<CrawlSession>`. The frontier and the counters
//! live behind separate mutexes; no lock is held across an `.await`.

use crate::crawler::Frontier;
use crate::state::{CrawlStatus, PageState};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A page that was written to the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
    pub url: String,
    pub title: String,
    /// Slash-separated path relative to the output root
    pub path: String,
    pub depth: u32,
}

/// Counters and per-URL outcomes collected during a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub pages_downloaded: usize,
    pub assets_downloaded: usize,
    pub pages_filtered: usize,

    /// URL → reason, for pages and assets
    pub failed_urls: BTreeMap<String, String>,

    pub saved: Vec<SavedPage>,

    states: HashMap<String, PageState>,
    completed: usize,
}

impl CrawlStats {
    /// Current state of a page URL
    pub fn state_of(&self, url: &str) -> Option<PageState> {
        self.states.get(url).copied()
    }

    /// Number of pages per state
    pub fn state_counts(&self) -> BTreeMap<PageState, usize> {
        let mut counts = BTreeMap::new();
        for state in self.states.values() {
            *counts.entry(*state).or_insert(0) += 1;
        }
        counts
    }

    /// Pages that reached a terminal state
    pub fn completed(&self) -> usize {
        self.completed
    }
}

/// Shared state of one crawl invocation
#[derive(Debug)]
pub struct CrawlSession {
    frontier: Mutex<Frontier>,
    stats: Mutex<CrawlStats>,
    status: Mutex<CrawlStatus>,
    stop: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
}

impl CrawlSession {
    pub fn new(max_depth: u32, max_pages: Option<usize>) -> Self {
        Self {
            frontier: Mutex::new(Frontier::new(max_depth, max_pages)),
            stats: Mutex::new(CrawlStats::default()),
            status: Mutex::new(CrawlStatus::Pending),
            stop: Arc::new(AtomicBool::new(false)),
            started_at: Utc::now(),
        }
    }

    /// Runs `f` with exclusive access to the frontier
    pub fn with_frontier<R>(&self, f: impl FnOnce(&mut Frontier) -> R) -> R {
        f(&mut lock(&self.frontier))
    }

    /// Copy of the counters as they are now
    pub fn snapshot(&self) -> CrawlStats {
        lock(&self.stats).clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> CrawlStatus {
        *lock(&self.status)
    }

    pub fn set_status(&self, status: CrawlStatus) {
        *lock(&self.status) = status;
    }

    /// Flag raised to stop dispatching new batches
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Moves a page to `next`
    ///
    /// A page seen for the first time may enter in any active state.
    /// Transitions the state machine forbids are logged and ignored.
    pub fn transition(&self, url: &str, next: PageState) {
        let mut stats = lock(&self.stats);
        Self::apply_transition(&mut stats, url, next);
    }

    /// Records a saved page and counts it as downloaded
    pub fn record_saved(&self, page: SavedPage) {
        let mut stats = lock(&self.stats);
        Self::apply_transition(&mut stats, &page.url, PageState::Saved);
        stats.pages_downloaded += 1;
        stats.saved.push(page);
    }

    /// Records a page excluded by policy (never a failure)
    pub fn record_filtered(&self, url: &str, reason: &str) {
        tracing::debug!("Filtered out {}: {}", url, reason);
        let mut stats = lock(&self.stats);
        Self::apply_transition(&mut stats, url, PageState::FilteredOut);
        stats.pages_filtered += 1;
    }

    /// Records a failed page
    pub fn record_failure(&self, url: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Failed {}: {}", url, reason);
        let mut stats = lock(&self.stats);
        Self::apply_transition(&mut stats, url, PageState::Failed);
        stats.failed_urls.insert(url.to_string(), reason);
    }

    /// Records a failed asset download
    pub fn record_asset_failure(&self, url: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Failed asset {}: {}", url, reason);
        lock(&self.stats)
            .failed_urls
            .insert(url.to_string(), reason);
    }

    pub fn record_asset_saved(&self) {
        lock(&self.stats).assets_downloaded += 1;
    }

    /// Pages that reached a terminal state so far
    pub fn completed(&self) -> usize {
        lock(&self.stats).completed()
    }

    fn apply_transition(stats: &mut CrawlStats, url: &str, next: PageState) {
        match stats.states.get(url).copied() {
            Some(current) if !current.can_transition_to(next) => {
                tracing::debug!("Ignoring transition {} -> {} for {}", current, next, url);
            }
            None if next.is_terminal() => {
                tracing::debug!("Ignoring transition to {} for unknown page {}", next, url);
            }
            _ => {
                stats.states.insert(url.to_string(), next);
                if next.is_terminal() {
                    stats.completed += 1;
                }
            }
        }
    }
}

/// Locks a mutex, recovering the data if a worker panicked while holding it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
