use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use url::Url;

/// Longest slug produced for a single path segment
const MAX_SLUG_LEN: usize = 80;

/// Path segments dropped while mapping (compared case-insensitively)
const DROPPED_SEGMENTS: &[&str] = &["docs"];

/// Page extensions removed from the last segment before it becomes a stem
const PAGE_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".aspx", ".asp", ".shtml"];

/// Converts text into a filesystem-safe slug
///
/// Alphanumeric characters are lowercased and kept; every other run of
/// characters becomes a single `-`. Leading and trailing hyphens are removed
/// and the result is cut to 80 characters.
///
/// # Examples
///
/// ```
/// use doc_mirror::url::slugify;
///
/// assert_eq!(slugify("Getting Started!"), "getting-started");
/// assert_eq!(slugify("API_v2.Reference"), "api-v2-reference");
/// assert_eq!(slugify("---"), "");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.chars().count() > MAX_SLUG_LEN {
        slug = slug.chars().take(MAX_SLUG_LEN).collect();
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// Location of a mirrored page, relative to the output root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagePath {
    /// Nested directories, outermost first
    pub dirs: Vec<String>,

    /// File name without extension
    pub stem: String,

    /// File extension without the dot
    pub extension: &'static str,
}

impl PagePath {
    /// File name including the extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.extension)
    }

    /// Relative filesystem path (`dirs/.../stem.ext`)
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.dirs.iter().collect();
        path.push(self.file_name());
        path
    }

    /// Directory joined onto an output root
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        self.dirs.iter().fold(root.to_path_buf(), |acc, d| acc.join(d))
    }

    /// Slash-separated relative path, as used inside documents
    pub fn to_slash_string(&self) -> String {
        let mut parts: Vec<&str> = self.dirs.iter().map(String::as_str).collect();
        let file_name = self.file_name();
        parts.push(&file_name);
        parts.join("/")
    }

    /// Relative reference from this page's directory to `target`
    ///
    /// # Examples
    ///
    /// ```
    /// use doc_mirror::url::PathMapper;
    /// use url::Url;
    ///
    /// let mapper = PathMapper::new(Url::parse("https://d.example.com/").unwrap(), "md");
    /// let from = mapper.map(&Url::parse("https://d.example.com/guide/setup/install").unwrap());
    /// let to = mapper.map(&Url::parse("https://d.example.com/api/client").unwrap());
    ///
    /// assert_eq!(from.link_to(&to), "../../api/client.md");
    /// ```
    pub fn link_to(&self, target: &PagePath) -> String {
        let common = self
            .dirs
            .iter()
            .zip(&target.dirs)
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<String> = std::iter::repeat("..".to_string())
            .take(self.dirs.len() - common)
            .collect();
        parts.extend(target.dirs[common..].iter().cloned());
        parts.push(target.file_name());

        parts.join("/")
    }
}

/// Maps page URLs onto the mirrored directory tree
///
/// The mapping is a pure function of the URL, the base URL and the output
/// extension: the same URL always lands on the same [`PagePath`].
#[derive(Debug, Clone)]
pub struct PathMapper {
    base_path: String,
    extension: &'static str,
}

impl PathMapper {
    /// Creates a mapper for pages under `base_url` saved with `extension`
    pub fn new(base_url: Url, extension: &'static str) -> Self {
        Self {
            base_path: base_url.path().trim_end_matches('/').to_string(),
            extension,
        }
    }

    /// Extension of every mapped page
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Maps a URL to its page location
    ///
    /// The base path prefix is removed, empty and `docs` segments are
    /// dropped and the remainder is slugified. The last segment becomes the
    /// file stem; no remaining segment means `index`.
    pub fn map(&self, url: &Url) -> PagePath {
        let mut segments = self.segments(url);

        let stem = match segments.pop() {
            Some(last) => last,
            None => "index".to_string(),
        };

        PagePath {
            dirs: segments,
            stem,
            extension: self.extension,
        }
    }

    /// Relative reference between the mapped files of two page URLs
    pub fn relative_link(&self, from: &Url, to: &Url) -> String {
        self.map(from).link_to(&self.map(to))
    }

    /// Slugified path segments of `url` below the base path, percent-decoded
    fn segments(&self, url: &Url) -> Vec<String> {
        let path = url.path();
        let relative = match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };

        let raw: Vec<Cow<'_, str>> = relative
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy())
            .filter(|s| !DROPPED_SEGMENTS.iter().any(|d| s.eq_ignore_ascii_case(d)))
            .collect();

        let count = raw.len();
        raw.into_iter()
            .enumerate()
            .map(|(i, segment)| {
                if i + 1 == count {
                    slugify(strip_page_extension(&segment))
                } else {
                    slugify(&segment)
                }
            })
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn strip_page_extension(segment: &str) -> &str {
    let lowered = segment.to_ascii_lowercase();
    PAGE_EXTENSIONS
        .iter()
        .find(|ext| lowered.ends_with(*ext) && lowered.len() > ext.len())
        .map_or(segment, |ext| &segment[..segment.len() - ext.len()])
}

/// Asset category, which is also the directory below `assets/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Css,
    Js,
    Font,
    Other,
}

impl AssetKind {
    /// Directory name below `assets/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Css => "css",
            Self::Js => "js",
            Self::Font => "fonts",
            Self::Other => "other",
        }
    }

    /// Classifies an asset by the extension of its URL path
    ///
    /// Unknown extensions fall back to `hint`, the kind implied by the tag
    /// that referenced the asset.
    pub fn classify(url: &Url, hint: AssetKind) -> AssetKind {
        match url_extension(url).as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "ico" | "bmp" | "avif") => {
                Self::Image
            }
            Some("css" | "scss" | "less") => Self::Css,
            Some("js" | "mjs") => Self::Js,
            Some("woff" | "woff2" | "ttf" | "eot" | "otf") => Self::Font,
            _ => hint,
        }
    }
}

/// Lowercased extension of the last path segment, if any
pub fn url_extension(url: &Url) -> Option<String> {
    let name = url.path_segments()?.next_back()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Relative path for a downloaded asset: `assets/<kind>/<file name>`
///
/// The file name is the URL's last path segment with unsafe characters
/// replaced; an empty name is derived from the whole URL instead.
/// Collisions are resolved when the file is written.
pub fn asset_path(url: &Url, kind: AssetKind) -> PathBuf {
    let last = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or_default();

    let mut name: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches(['.', '_']).is_empty() {
        name = slugify(url.as_str());
        if name.is_empty() {
            name = "asset".to_string();
        }
        if let Some(ext) = url_extension(url) {
            name = format!("{}.{}", name, ext);
        }
    }

    Path::new("assets").join(kind.dir_name()).join(name)
}
