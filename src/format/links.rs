use crate::format::PageLocation;
use crate::url::{normalize_url, same_origin, url_extension, PathMapper};
use url::Url;

/// Extensions of targets that are pages rather than downloadable files
const PAGE_LIKE_EXTENSIONS: &[&str] = &["html", "htm", "php", "aspx", "asp", "shtml"];

/// Rewrites references inside converted documents
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    base: Url,
    mapper: PathMapper,
}

impl LinkRewriter {
    pub fn new(base: Url, extension: &'static str) -> Self {
        let mapper = PathMapper::new(base.clone(), extension);
        Self { base, mapper }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Relative path from the current page's file to the mirrored target page
    ///
    /// `href` resolves against the page's post-redirect address; the path is
    /// computed from the file the page is saved as. A fragment on `href` is
    /// carried over. Returns `None` for references that are not same-origin
    /// pages (external links, bare fragments, `mailto:`, files such as PDFs).
    pub fn local_target(&self, href: &str, page: PageLocation<'_>) -> Option<String> {
        let target = normalize_url(href, page.resolve_against).ok()?;
        if !same_origin(&target, &self.base) {
            return None;
        }
        if let Some(ext) = url_extension(&target) {
            if !PAGE_LIKE_EXTENSIONS.contains(&ext.as_str()) {
                return None;
            }
        }

        let mut local = self.mapper.relative_link(page.url, &target);
        if let Some((_, fragment)) = href.trim().split_once('#') {
            if !fragment.is_empty() {
                local.push('#');
                local.push_str(fragment);
            }
        }
        Some(local)
    }

    /// Absolute form of a relative reference
    ///
    /// Already absolute references, fragments and pseudo-schemes are left
    /// alone (`None`).
    pub fn absolute(&self, href: &str, page: PageLocation<'_>) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || Url::parse(href).is_ok() {
            return None;
        }
        page.resolve_against.join(href).ok().map(|u| u.to_string())
    }
}
