//! Asset download pool
//!
//! Assets are dispatched fire-and-forget while pages are crawled. A
//! semaphore bounds the downloads in flight; [`AssetPool::finish`] waits for
//! all of them at the end of the crawl.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::AssetRef;
use crate::output::AssetWriter;
use crate::state::CrawlSession;
use crate::url::AssetKind;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct AssetPool {
    fetcher: Fetcher,
    writer: Arc<AssetWriter>,
    session: Arc<CrawlSession>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    lanes: usize,
    next_lane: usize,
}

impl AssetPool {
    /// Creates a pool running at most `concurrency` downloads at once
    pub fn new(
        fetcher: Fetcher,
        writer: Arc<AssetWriter>,
        session: Arc<CrawlSession>,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            fetcher,
            writer,
            session,
            permits: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
            lanes: concurrency,
            next_lane: 0,
        }
    }

    /// Starts downloading an asset in the background
    pub fn dispatch(&mut self, asset: AssetRef) {
        let lane = self.next_lane % self.lanes;
        self.next_lane = self.next_lane.wrapping_add(1);

        let fetcher = self.fetcher.clone();
        let writer = Arc::clone(&self.writer);
        let session = Arc::clone(&self.session);
        let permits = Arc::clone(&self.permits);

        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let url = asset.url;
            match fetcher.fetch_bytes(&url, lane).await {
                Ok(bytes) => {
                    let kind = AssetKind::classify(&url, asset.hint);
                    match writer.write_asset(&url, kind, &bytes).await {
                        Ok(path) => {
                            tracing::debug!("Saved asset {} -> {}", url, path.display());
                            session.record_asset_saved();
                        }
                        Err(e) => session.record_asset_failure(url.as_str(), e.to_string()),
                    }
                }
                Err(e) => session.record_asset_failure(
                    url.as_str(),
                    format!("{} (after {} attempts)", e.error, e.attempts),
                ),
            }
        });
    }

    /// Waits for every dispatched download
    pub async fn finish(mut self) {
        let pending = self.tasks.len();
        if pending > 0 {
            tracing::info!("Waiting for {} asset downloads", pending);
        }

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Asset task failed: {}", e);
            }
        }
    }
}
