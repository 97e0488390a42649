//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: Tracks the state of individual pages (discovered, queued, fetching, saved, etc.)
//! - `CrawlStatus`: Lifecycle of the crawl as a whole
//! - `CrawlSession`: Frontier, counters and failed URLs shared by all workers

mod page_state;
mod session;

// Re-export main types
pub use page_state::{CrawlStatus, PageState};
pub use session::{CrawlSession, CrawlStats, SavedPage};
