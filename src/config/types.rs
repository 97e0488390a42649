use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Desktop browser user agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Main configuration structure for Doc-Mirror
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub crawler: CrawlerConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub filters: FilterConfig,
}

/// What to crawl and where to put it
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Documentation root; also the scope for same-domain checks
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Directory that receives the mirrored tree
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Extra start URLs crawled at depth 0 next to the base URL
    pub seeds: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            output_dir: "./docs".to_string(),
            seeds: Vec::new(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum link hops from a seed
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Politeness delay between requests of one worker (seconds)
    pub delay: f64,

    /// Maximum number of pages fetched; unset means unlimited
    #[serde(rename = "max-pages", skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Worker pool size for pages and for assets
    #[serde(rename = "concurrent-requests")]
    pub concurrent_requests: usize,

    /// Whether images, stylesheets and scripts are downloaded
    #[serde(rename = "include-assets")]
    pub include_assets: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            delay: 0.5,
            max_pages: None,
            concurrent_requests: 5,
            include_assets: false,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout (seconds)
    pub timeout: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound of a single backoff sleep (milliseconds)
    #[serde(rename = "retry-max-delay-ms")]
    pub retry_max_delay_ms: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Extra request headers, applied after the browser-like defaults
    pub headers: BTreeMap<String, String>,

    /// Static cookies sent with every request
    pub cookies: BTreeMap<String, String>,

    /// Proxy URL per scheme (`http`, `https` or `all`)
    pub proxies: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            proxies: BTreeMap::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// HTML output: re-serialize the document instead of saving it verbatim
    #[serde(rename = "clean-html")]
    pub clean_html: bool,

    /// HTML output: drop script, style, iframe and noscript elements
    #[serde(rename = "remove-scripts")]
    pub remove_scripts: bool,

    /// HTML output: how relative references are rewritten
    #[serde(rename = "html-links")]
    pub html_links: LinkMode,

    /// Write `_index.md` (table of contents) at the end of the crawl
    #[serde(rename = "write-index")]
    pub write_index: bool,

    /// Write `_report.md` (crawl summary) at the end of the crawl
    #[serde(rename = "write-report")]
    pub write_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            clean_html: true,
            remove_scripts: true,
            html_links: LinkMode::Absolute,
            write_index: true,
            write_report: true,
        }
    }
}

/// Include/exclude patterns and the manual skip list
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(rename = "url-include")]
    pub url_include: Vec<String>,

    #[serde(rename = "url-exclude")]
    pub url_exclude: Vec<String>,

    #[serde(rename = "content-include")]
    pub content_include: Vec<String>,

    #[serde(rename = "content-exclude")]
    pub content_exclude: Vec<String>,

    /// Exact URLs never fetched
    #[serde(rename = "skip-urls")]
    pub skip_urls: Vec<String>,
}

/// Output document format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with front matter
    #[default]
    #[serde(alias = "markup")]
    Markdown,
    /// Cleaned pass-through HTML
    #[serde(alias = "passthrough")]
    Html,
    /// Wrapped plain text
    Text,
    /// Structured JSON document
    #[serde(alias = "structured")]
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Markdown,
        OutputFormat::Html,
        OutputFormat::Text,
        OutputFormat::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" | "markup" => Ok(Self::Markdown),
            "html" | "passthrough" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            "json" | "structured" => Ok(Self::Json),
            other => Err(format!(
                "unknown output format '{}' (expected markdown, html, text or json)",
                other
            )),
        }
    }
}

/// Link handling for the HTML formatter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Resolve relative references against the page URL
    #[default]
    Absolute,
    /// Point same-domain page links at their mirrored local files
    Local,
    /// Leave references untouched
    Keep,
}

impl LinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::Local => "local",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" => Ok(Self::Absolute),
            "local" => Ok(Self::Local),
            "keep" => Ok(Self::Keep),
            other => Err(format!(
                "unknown link mode '{}' (expected absolute, local or keep)",
                other
            )),
        }
    }
}
