use crate::{UrlError, UrlResult};
use url::form_urlencoded;
use url::Url;

/// Query parameters removed during normalization (compared case-insensitively)
///
/// Any parameter starting with `utm_` is removed as well.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "mc_cid", "mc_eid", "ref", "source", "_ga", "_gl", "_hsenc", "_hsmi",
    "__hstc", "__hssc", "__hsfp",
];

/// Reference prefixes that never point at a fetchable document
const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:"];

/// Normalizes a URL according to Doc-Mirror's normalization rules
///
/// # Normalization Steps
///
/// 1. Reject empty, fragment-only, `javascript:`, `mailto:` and `tel:` references
/// 2. Resolve the reference against `base` (relative paths, scheme-relative URLs)
/// 3. Require an `http`/`https` scheme and a host
/// 4. Remove the fragment
/// 5. Collapse runs of `/` in the path into a single slash
/// 6. Remove tracking query parameters (`utm_*`, `gclid`, `fbclid`, ...)
/// 7. Sort the remaining query parameters by key and re-encode them
/// 8. Remove an empty query string
///
/// The host is lowercased and dot segments are resolved by the URL parser.
/// A trailing slash is kept (as a single slash), so `/guide/` and `/guide`
/// stay distinct pages.
///
/// # Arguments
///
/// * `href` - The reference to normalize, absolute or relative
/// * `base` - The URL the reference appeared on
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - The reference must not enter the frontier
///
/// # Examples
///
/// ```
/// use doc_mirror::url::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://docs.example.com/").unwrap();
/// let url = normalize_url("/a//b/?utm_source=news&lang=en", &base).unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/a/b/?lang=en");
/// ```
pub fn normalize_url(href: &str, base: &Url) -> UrlResult<Url> {
    let href = href.trim();

    if href.is_empty() {
        return Err(UrlError::Skipped("empty reference".to_string()));
    }

    let lowered = href.to_ascii_lowercase();
    if href.starts_with('#') || SKIPPED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return Err(UrlError::Skipped(href.to_string()));
    }

    let mut url = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    let path = collapse_slashes(url.path());
    url.set_path(&path);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);

        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            url.set_query(Some(&query));
        }
    }

    Ok(url)
}

/// Normalizes an absolute URL string, using the URL itself as the base
pub fn normalize_absolute(url_str: &str) -> UrlResult<Url> {
    let base = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_url(url_str, &base)
}

/// Collapses repeated slashes; the path always keeps its leading slash
fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len().max(1));
    let mut previous_slash = false;

    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() {
        collapsed.push('/');
    }

    collapsed
}

/// Filters out tracking parameters and sorts remaining query parameters
///
/// The sort is stable, so repeated keys keep their relative order.
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}
