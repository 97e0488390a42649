use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use doc_mirror::url::extract_domain;
///
/// let url = Url::parse("https://DOCS.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs share scheme, host and effective port
///
/// This is the "same domain" rule used for page links: `http` and `https`
/// variants of a host are different sites, and so are two ports.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use doc_mirror::url::same_origin;
///
/// let base = Url::parse("https://docs.example.com/guide/").unwrap();
/// let page = Url::parse("https://docs.example.com:443/guide/intro").unwrap();
/// let other = Url::parse("https://other.com/x").unwrap();
///
/// assert!(same_origin(&base, &page));
/// assert!(!same_origin(&base, &other));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && extract_domain(a) == extract_domain(b)
        && a.port_or_known_default() == b.port_or_known_default()
}
