//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the batch loop that drives a crawl:
//! - Building the fetcher, filter, formatter and writers from the config
//! - Seeding the frontier with the base URL and extra seeds
//! - Dispatching batches of at most `concurrent-requests` pages and waiting
//!   for each batch before the next one
//! - Feeding discovered assets to the asset pool
//! - Writing the index and the report once the frontier is drained

use crate::config::{validate, Config};
use crate::crawler::assets::AssetPool;
use crate::crawler::filter::ContentFilter;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Offer;
use crate::crawler::pipeline::{self, PipelineContext};
use crate::crawler::politeness::Politeness;
use crate::format::{Formatter, FormatterConfig};
use crate::output::{
    format_index, format_markdown_report, AssetWriter, CrawlReport, PageWriter, INDEX_FILE,
    REPORT_FILE,
};
use crate::state::{CrawlSession, CrawlStats, CrawlStatus, PageState};
use crate::url::{normalize_absolute, PathMapper};
use crate::{ConfigError, MirrorError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Invoked after every page with `(url, completed, total_estimate)`
pub type ProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Requests a graceful stop of a running crawl
///
/// In-flight pages finish; no further batch is dispatched.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a crawl invocation
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub pages_downloaded: usize,
    pub assets_downloaded: usize,

    /// URL → reason, for pages and assets
    pub failed_urls: BTreeMap<String, String>,

    pub status: CrawlStatus,
    pub stats: CrawlStats,
    pub report: CrawlReport,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    base_url: Url,
    seeds: Vec<Url>,
    output_dir: PathBuf,
    context: Arc<PipelineContext>,
    asset_fetcher: Fetcher,
    assets: Arc<AssetWriter>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("base_url", &self.base_url.as_str())
            .field("seeds", &self.seeds.len())
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MirrorError)` - Invalid configuration, base URL or output directory
    pub fn new(config: Config) -> Result<Self, MirrorError> {
        validate(&config)?;

        let base_url = normalize_absolute(&config.target.base_url).map_err(|source| {
            MirrorError::InvalidBaseUrl {
                url: config.target.base_url.clone(),
                source,
            }
        })?;

        let seeds = config
            .target
            .seeds
            .iter()
            .map(|seed| {
                normalize_absolute(seed)
                    .map_err(|e| ConfigError::InvalidUrl(format!("seed '{}': {}", seed, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output_dir = PathBuf::from(&config.target.output_dir);
        std::fs::create_dir_all(&output_dir).map_err(|source| MirrorError::OutputRoot {
            path: output_dir.clone(),
            source,
        })?;

        let workers = config.crawler.concurrent_requests;
        let politeness = Arc::new(Politeness::from_secs(config.crawler.delay, workers));
        let fetcher = Fetcher::new(&config.http, &base_url, politeness)?;
        let asset_fetcher =
            fetcher.with_politeness(Arc::new(Politeness::from_secs(config.crawler.delay, workers)));

        let formatter = Formatter::new(
            config.output.format,
            FormatterConfig::from_output(base_url.clone(), &config.output, Utc::now()),
        );

        let context = PipelineContext {
            session: Arc::new(CrawlSession::new(
                config.crawler.max_depth,
                config.crawler.max_pages,
            )),
            filter: ContentFilter::from_config(&config.filters)?,
            mapper: PathMapper::new(base_url.clone(), formatter.extension()),
            formatter,
            fetcher,
            pages: PageWriter::new(&output_dir),
            base_url: base_url.clone(),
            include_assets: config.crawler.include_assets,
        };

        Ok(Self {
            base_url,
            seeds,
            assets: Arc::new(AssetWriter::new(&output_dir)),
            output_dir,
            context: Arc::new(context),
            asset_fetcher,
            progress: None,
            config,
        })
    }

    /// Attaches a progress callback
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle that stops the crawl after the current batch
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.context.session.stop_flag())
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.context.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Runs the batch loop until the frontier is drained, the page budget is
    /// spent or a stop is requested
    ///
    /// Per-URL failures never end the crawl; they are collected in
    /// [`CrawlOutcome::failed_urls`].
    pub async fn run(&mut self) -> Result<CrawlOutcome, MirrorError> {
        let session = Arc::clone(&self.context.session);
        let workers = self.config.crawler.concurrent_requests.max(1);

        session.set_status(CrawlStatus::Running);
        tracing::info!(
            "Starting crawl of {} (max depth {}, {} workers)",
            self.base_url,
            self.config.crawler.max_depth,
            workers
        );

        self.seed();

        let mut assets = self.config.crawler.include_assets.then(|| {
            AssetPool::new(
                self.asset_fetcher.clone(),
                Arc::clone(&self.assets),
                Arc::clone(&session),
                workers,
            )
        });

        let mut batches = 0;
        let status = loop {
            if session.stop_requested() {
                tracing::info!("Stop requested, not dispatching further pages");
                break CrawlStatus::Aborted;
            }

            let batch = session.with_frontier(|f| f.next_batch(workers));
            if batch.is_empty() {
                if session.with_frontier(|f| f.budget_exhausted()) {
                    tracing::info!("Page budget reached, crawl complete");
                } else {
                    tracing::info!("Frontier is empty, crawl complete");
                }
                break CrawlStatus::Completed;
            }

            batches += 1;
            tracing::debug!("Dispatching batch {} with {} pages", batches, batch.len());

            let mut tasks = JoinSet::new();
            for (lane, target) in batch.into_iter().enumerate() {
                let context = Arc::clone(&self.context);
                tasks.spawn(async move {
                    let url = target.url.to_string();
                    let found = pipeline::process(&context, target, lane).await;
                    (url, found)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((url, found)) => {
                        if let Some(pool) = assets.as_mut() {
                            for asset in found {
                                pool.dispatch(asset);
                            }
                        }
                        self.report_progress(&url);
                    }
                    Err(e) => tracing::error!("Page worker failed: {}", e),
                }
            }
        };

        if let Some(pool) = assets {
            pool.finish().await;
        }

        session.set_status(status);
        Ok(self.finish(status).await)
    }

    /// Queues the base URL and the extra seeds at depth 0
    fn seed(&self) {
        let session = &self.context.session;
        let start: Vec<Url> = std::iter::once(self.base_url.clone())
            .chain(self.seeds.iter().cloned())
            .collect();

        let queued: Vec<String> = session.with_frontier(|f| {
            start
                .into_iter()
                .filter_map(|url| {
                    let key = url.to_string();
                    (f.seed(url) == Offer::Enqueued).then_some(key)
                })
                .collect()
        });

        for url in &queued {
            session.transition(url, PageState::Queued);
        }
        tracing::debug!("Seeded frontier with {} URLs", queued.len());
    }

    fn report_progress(&self, url: &str) {
        let session = &self.context.session;
        let completed = session.completed();
        let total = session.with_frontier(|f| f.total_estimate());

        if completed % 10 == 0 {
            tracing::info!("Progress: {} / {} pages", completed, total);
        }
        if let Some(progress) = &self.progress {
            progress(url, completed, total);
        }
    }

    /// Writes the index and report and assembles the outcome
    async fn finish(&self, status: CrawlStatus) -> CrawlOutcome {
        let session = &self.context.session;
        let stats = session.snapshot();
        let finished_at = Utc::now();

        let config_hash = self.config.fingerprint().unwrap_or_else(|e| {
            tracing::warn!("Could not fingerprint configuration: {}", e);
            String::new()
        });

        let report = CrawlReport::new(
            self.base_url.as_str(),
            &self.output_dir.to_string_lossy(),
            self.config.output.format,
            session.started_at(),
            finished_at,
            status,
            config_hash,
            &stats,
        );

        if self.config.output.write_index {
            let index = format_index(&self.base_url, finished_at, &stats.saved);
            self.write_root_file(INDEX_FILE, &index).await;
        }
        if self.config.output.write_report {
            self.write_root_file(REPORT_FILE, &format_markdown_report(&report))
                .await;
        }

        tracing::info!(
            "Crawl {}: {} pages, {} assets, {} failed URLs in {}s",
            status,
            stats.pages_downloaded,
            stats.assets_downloaded,
            stats.failed_urls.len(),
            report.duration_seconds()
        );

        CrawlOutcome {
            pages_downloaded: stats.pages_downloaded,
            assets_downloaded: stats.assets_downloaded,
            failed_urls: stats.failed_urls.clone(),
            status,
            stats,
            report,
        }
    }

    async fn write_root_file(&self, name: &str, content: &str) {
        if let Err(e) = self.context.pages.write_root_file(name, content).await {
            tracing::warn!("Could not write {}: {}", name, e);
        }
    }
}

/// Runs a complete crawl operation
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - The crawl ran (individual pages may have failed)
/// * `Err(MirrorError)` - The configuration was rejected
///
/// # Example
///
/// ```no_run
/// use doc_mirror::config::Config;
/// use doc_mirror::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::default();
/// config.target.base_url = "https://docs.example.com/".to_string();
/// let outcome = run_crawl(config).await?;
/// println!("{} pages saved", outcome.pages_downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlOutcome, MirrorError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
