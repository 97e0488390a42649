//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with browser-like headers and proxies
//! - Cookies and `Referer` sent only to the origin of the base URL
//! - Per-worker politeness delays before every request
//! - Retry with exponential backoff for transient failures
//! - Error classification (not found, rate limited, server errors)

use crate::config::HttpConfig;
use crate::crawler::politeness::Politeness;
use crate::crawler::retry::{retry, Exhausted, RetryDecision, RetryPolicy};
use crate::url::same_origin;
use crate::{ConfigError, FetchError, MirrorError};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Result of fetching a page
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value, if the server sent one
        content_type: Option<String>,
        /// Page body content
        body: String,
    },

    /// The server reported the page as absent (404 / 410); never retried
    NotFound {
        /// The HTTP status code
        status_code: u16,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Every attempt failed
    Failed {
        /// Error description of the last attempt
        reason: String,
        /// Attempts made, including the first
        attempts: u32,
    },
}

/// HTTP client plus the retry and politeness policies
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    politeness: Arc<Politeness>,
    base_url: Url,
    /// `Cookie` and `Referer`, attached to same-origin requests only
    origin_headers: HeaderMap,
}

impl Fetcher {
    /// Creates a fetcher from the HTTP configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Timeout, retries, headers, cookies and proxies
    /// * `base_url` - Origin that receives cookies; also sent as its `Referer`
    /// * `politeness` - Delay policy shared by the workers using this fetcher
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Successfully built fetcher
    /// * `Err(MirrorError)` - Invalid header, proxy or client settings
    pub fn new(
        config: &HttpConfig,
        base_url: &Url,
        politeness: Arc<Politeness>,
    ) -> Result<Self, MirrorError> {
        let client = build_http_client(config)?;

        Ok(Self {
            client,
            policy: RetryPolicy::from_config(config),
            politeness,
            base_url: base_url.clone(),
            origin_headers: origin_headers(config, base_url)?,
        })
    }

    /// Same client and retry policy, with separate politeness lanes
    pub fn with_politeness(&self, politeness: Arc<Politeness>) -> Self {
        Self {
            client: self.client.clone(),
            policy: self.policy,
            politeness,
            base_url: self.base_url.clone(),
            origin_headers: self.origin_headers.clone(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a page
    ///
    /// # Request Flow
    ///
    /// 1. Wait for the worker's politeness lane
    /// 2. Send a GET request (redirects are followed by the client)
    /// 3. Map the status code; retry transient failures
    /// 4. Reject non-HTML content without reading the body
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `lane` - Index of the calling worker
    pub async fn fetch(&self, url: &Url, lane: usize) -> FetchResult {
        let outcome = retry(
            &self.policy,
            |_| async move {
                let response = self.get(url, lane).await?;
                read_page(response).await
            },
            RetryDecision::for_fetch_error,
        )
        .await;

        match outcome {
            Ok(Page::Html {
                final_url,
                status_code,
                content_type,
                body,
            }) => FetchResult::Success {
                final_url,
                status_code,
                content_type,
                body,
            },
            Ok(Page::Other(content_type)) => FetchResult::ContentMismatch { content_type },
            Err(Exhausted {
                error: FetchError::NotFound(status_code),
                ..
            }) => FetchResult::NotFound { status_code },
            Err(Exhausted { error, attempts }) => FetchResult::Failed {
                reason: error.to_string(),
                attempts,
            },
        }
    }

    /// Fetches raw bytes (assets) with the same retry policy
    pub async fn fetch_bytes(&self, url: &Url, lane: usize) -> Result<Vec<u8>, Exhausted<FetchError>> {
        retry(
            &self.policy,
            |_| async move {
                let response = self.get(url, lane).await?;
                Ok::<_, FetchError>(response.bytes().await?.to_vec())
            },
            RetryDecision::for_fetch_error,
        )
        .await
    }

    /// One GET request with status classification
    async fn get(&self, url: &Url, lane: usize) -> Result<Response, FetchError> {
        self.politeness.wait(lane).await;

        tracing::debug!("GET {}", url);
        let mut request = self.client.get(url.as_str());
        if same_origin(url, &self.base_url) {
            request = request.headers(self.origin_headers.clone());
        }
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound(status.as_u16()),
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
                retry_after: retry_after(&response),
            },
            _ => FetchError::Status(status.as_u16()),
        })
    }
}

/// A successful response, before it becomes a [`FetchResult`]
enum Page {
    Html {
        final_url: Url,
        status_code: u16,
        content_type: Option<String>,
        body: String,
    },
    Other(String),
}

async fn read_page(response: Response) -> Result<Page, FetchError> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(ct) = &content_type {
        if !is_html_content_type(ct) {
            return Ok(Page::Other(ct.clone()));
        }
    }

    let final_url = response.url().clone();
    let status_code = response.status().as_u16();
    let body = response.text().await?;

    Ok(Page::Html {
        final_url,
        status_code,
        content_type,
        body,
    })
}

/// Returns true for HTML and XHTML content types
pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

/// Parses a `Retry-After` header given in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Builds an HTTP client with proper configuration
///
/// Default headers emulate a desktop browser; configured headers replace
/// defaults of the same name. Cookies are not part of the client, see
/// [`Fetcher`].
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(MirrorError)` - Invalid header or proxy, or the client failed to build
pub fn build_http_client(config: &HttpConfig) -> Result<Client, MirrorError> {
    let headers = default_headers(config)?;

    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.timeout.min(10)))
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .brotli(true);

    for (scheme, proxy_url) in &config.proxies {
        let proxy = match scheme.as_str() {
            "http" => Proxy::http(proxy_url),
            "https" => Proxy::https(proxy_url),
            _ => Proxy::all(proxy_url),
        }
        .map_err(|e| ConfigError::InvalidProxy {
            scheme: scheme.clone(),
            message: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

fn default_headers(config: &HttpConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("invalid header name '{}'", name)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

/// Headers only the base URL's origin receives: `Referer` and, when
/// configured, cookies joined into one `Cookie` header
fn origin_headers(config: &HttpConfig, base_url: &Url) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::REFERER, header_value(base_url.as_str())?);

    if !config.cookies.is_empty() {
        let cookie = config
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(header::COOKIE, header_value(&cookie)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|_| ConfigError::InvalidHeader(format!("invalid header value '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base() -> Url {
        Url::parse("https://docs.example.com/").unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers(&HttpConfig::default()).unwrap();
        assert!(headers[header::ACCEPT].to_str().unwrap().contains("text/html"));
        assert!(headers.get(header::REFERER).is_none());
        assert!(headers.get(header::COOKIE).is_none());
    }

    #[test]
    fn test_configured_headers_override_defaults() {
        let mut config = HttpConfig::default();
        config.headers = BTreeMap::from([
            ("Accept-Language".to_string(), "de-DE".to_string()),
            ("X-Token".to_string(), "abc".to_string()),
        ]);
        config.cookies = BTreeMap::from([
            ("session".to_string(), "42".to_string()),
            ("theme".to_string(), "dark".to_string()),
        ]);

        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[header::ACCEPT_LANGUAGE], "de-DE");
        assert_eq!(headers["x-token"], "abc");
        assert!(headers.get(header::COOKIE).is_none());

        let origin = origin_headers(&config, &base()).unwrap();
        assert_eq!(origin[header::COOKIE], "session=42; theme=dark");
        assert_eq!(origin[header::REFERER], "https://docs.example.com/");
    }

    #[test]
    fn test_no_cookie_header_without_cookies() {
        let origin = origin_headers(&HttpConfig::default(), &base()).unwrap();
        assert!(origin.get(header::COOKIE).is_none());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = HttpConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(build_http_client(&config).is_err());
    }

    #[test]
    fn test_proxy_configuration() {
        let mut config = HttpConfig::default();
        config
            .proxies
            .insert("https".to_string(), "http://127.0.0.1:3128".to_string());
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(is_html_content_type("TEXT/HTML"));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("application/json"));
    }
}
