//! Doc-Mirror main entry point
//!
//! This is the command-line interface for the documentation mirror.

use anyhow::{bail, Context};
use clap::Parser;
use doc_mirror::config::{read_config, validate, Config, LinkMode, OutputFormat};
use doc_mirror::crawler::{discover_sections, Coordinator, CrawlOutcome, Fetcher, Politeness};
use doc_mirror::format::all_metadata;
use doc_mirror::output::print_report;
use doc_mirror::url::normalize_absolute;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Doc-Mirror: mirror a documentation site to disk
///
/// Doc-Mirror crawls a documentation site from its base URL, follows
/// in-domain links up to a depth limit and converts every page into
/// Markdown, cleaned HTML, plain text or JSON.
#[derive(Parser, Debug)]
#[command(name = "doc-mirror")]
#[command(version = "1.0.0")]
#[command(about = "Mirror a documentation site as Markdown, HTML, text or JSON", long_about = None)]
struct Cli {
    /// Documentation root URL (overrides `[target] base-url`)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Additional start URL crawled at depth 0 (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Maximum link hops from a start URL
    #[arg(short, long)]
    depth: Option<u32>,

    /// Delay between requests of one worker, in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Number of concurrent requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Download images, stylesheets, scripts and fonts
    #[arg(long)]
    assets: bool,

    /// Output format: markdown, html, text or json
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// HTML output link handling: absolute, local or keep
    #[arg(long)]
    html_links: Option<LinkMode>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries for transient failures
    #[arg(long)]
    retries: Option<u32>,

    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Cookie as NAME=VALUE (repeatable)
    #[arg(long = "cookie", value_name = "NAME=VALUE", value_parser = parse_pair)]
    cookies: Vec<(String, String)>,

    /// Proxy as SCHEME=URL, scheme being http, https or all (repeatable)
    #[arg(long = "proxy", value_name = "SCHEME=URL", value_parser = parse_pair)]
    proxies: Vec<(String, String)>,

    /// Only crawl URLs matching this regex (repeatable)
    #[arg(long = "include", value_name = "REGEX")]
    include: Vec<String>,

    /// Skip URLs matching this regex (repeatable)
    #[arg(long = "exclude", value_name = "REGEX")]
    exclude: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["list_sections", "list_formats"])]
    dry_run: bool,

    /// List the documentation sections linked from the base URL and exit
    #[arg(long, conflicts_with_all = ["dry_run", "list_formats"])]
    list_sections: bool,

    /// List the available output formats and exit
    #[arg(long, conflicts_with_all = ["dry_run", "list_sections"])]
    list_formats: bool,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if cli.list_formats {
        handle_list_formats();
        return Ok(());
    }

    let config = build_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.list_sections {
        handle_list_sections(&config).await?;
    } else {
        handle_crawl(config, cli.quiet).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("doc_mirror=info,warn"),
            1 => EnvFilter::new("doc_mirror=debug,info"),
            2 => EnvFilter::new("doc_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any), applies command-line overrides and validates
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            read_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(url) = &cli.url {
        config.target.base_url = url.clone();
    }
    if let Some(output) = &cli.output {
        config.target.output_dir = output.clone();
    }
    config.target.seeds.extend(cli.seeds.iter().cloned());

    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(delay) = cli.delay {
        config.crawler.delay = delay;
    }
    if cli.max_pages.is_some() {
        config.crawler.max_pages = cli.max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrent_requests = concurrency;
    }
    if cli.assets {
        config.crawler.include_assets = true;
    }

    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(links) = cli.html_links {
        config.output.html_links = links;
    }

    if let Some(timeout) = cli.timeout {
        config.http.timeout = timeout;
    }
    if let Some(retries) = cli.retries {
        config.http.max_retries = retries;
    }
    if let Some(user_agent) = &cli.user_agent {
        config.http.user_agent = user_agent.clone();
    }
    config.http.headers.extend(cli.headers.iter().cloned());
    config.http.cookies.extend(cli.cookies.iter().cloned());
    config.http.proxies.extend(cli.proxies.iter().cloned());

    config.filters.url_include.extend(cli.include.iter().cloned());
    config.filters.url_exclude.extend(cli.exclude.iter().cloned());

    if config.target.base_url.is_empty() {
        bail!("no base URL given (pass a URL or set [target] base-url)");
    }

    validate(&config).context("invalid configuration")?;
    match config.fingerprint() {
        Ok(hash) => tracing::debug!("Configuration is valid (hash: {})", hash),
        Err(e) => tracing::debug!("Configuration is valid (no hash: {})", e),
    }

    Ok(config)
}

/// Handles --list-formats: prints formatter metadata
fn handle_list_formats() {
    println!("=== Output Formats ===\n");
    for meta in all_metadata() {
        println!("{} (.{}, {})", meta.name, meta.extension, meta.mime_type);
        println!("  {}", meta.description);
        for feature in &meta.features {
            println!("  - {}", feature);
        }
        println!();
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Doc-Mirror Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Output directory: {}", config.target.output_dir);
    for seed in &config.target.seeds {
        println!("  Seed: {}", seed);
    }

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Delay: {}s", config.crawler.delay);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Concurrent requests: {}", config.crawler.concurrent_requests);
    println!("  Include assets: {}", config.crawler.include_assets);

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout);
    println!("  Max retries: {}", config.http.max_retries);
    println!("  User agent: {}", config.http.user_agent);
    println!("  Extra headers: {}", config.http.headers.len());
    println!("  Cookies: {}", config.http.cookies.len());
    println!("  Proxies: {}", config.http.proxies.len());

    println!("\nOutput:");
    println!("  Format: {}", config.output.format);
    println!("  Write index: {}", config.output.write_index);
    println!("  Write report: {}", config.output.write_report);

    println!("\nFilters:");
    println!("  URL include patterns: {}", config.filters.url_include.len());
    println!("  URL exclude patterns: {}", config.filters.url_exclude.len());
    println!("  Content include patterns: {}", config.filters.content_include.len());
    println!("  Content exclude patterns: {}", config.filters.content_exclude.len());
    println!("  Skipped URLs: {}", config.filters.skip_urls.len());

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} start URLs",
        1 + config.target.seeds.len()
    );

    Ok(())
}

/// Handles --list-sections: prints the navigation links of the base page
async fn handle_list_sections(config: &Config) -> anyhow::Result<()> {
    let base_url = normalize_absolute(&config.target.base_url)
        .with_context(|| format!("invalid base URL '{}'", config.target.base_url))?;
    let fetcher = Fetcher::new(&config.http, &base_url, Arc::new(Politeness::from_secs(0.0, 1)))?;

    let sections = discover_sections(&fetcher, &base_url).await;
    if sections.is_empty() {
        println!("No documentation sections found at {}", base_url);
        return Ok(());
    }

    println!("Documentation sections at {}:\n", base_url);
    for (name, url) in &sections {
        println!("  {}: {}", name, url);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, quiet: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Mirroring {} into {} as {}",
        config.target.base_url,
        config.target.output_dir,
        config.output.format
    );

    let mut coordinator = Coordinator::new(config)?;

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    let outcome: CrawlOutcome = match coordinator.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if !quiet {
        println!();
        print_report(&outcome.report);
    }

    Ok(())
}
