//! Writing documents and assets under the output root
//!
//! Paths are claimed under a mutex before any I/O so that two URLs mapping
//! to the same file never overwrite each other: the later claimant gets a
//! numeric suffix (`page-1.md` for pages, `logo_1.png` for assets). Files are
//! written to a `.part` sibling first and renamed into place.

use crate::output::{OutputError, OutputResult};
use crate::url::{asset_path, AssetKind, PagePath};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Upper bound on numeric suffixes tried for one path
const MAX_SUFFIX: usize = 10_000;

/// Claimed relative paths and the URL that owns each
#[derive(Debug, Default)]
struct Claims(Mutex<HashMap<PathBuf, String>>);

impl Claims {
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the first free candidate for `url`
    ///
    /// A candidate already owned by `url` itself is reused.
    fn claim<T>(&self, url: &str, candidates: impl Iterator<Item = (T, PathBuf)>) -> Option<T> {
        let mut claims = self.lock();
        for (value, path) in candidates.take(MAX_SUFFIX) {
            match claims.get(&path) {
                Some(owner) if owner != url => continue,
                Some(_) => return Some(value),
                None => {
                    claims.insert(path, url.to_string());
                    return Some(value);
                }
            }
        }
        None
    }

    fn release(&self, path: &Path) {
        self.lock().remove(path);
    }
}

/// Writes converted pages
#[derive(Debug)]
pub struct PageWriter {
    root: PathBuf,
    claims: Claims,
}

impl PageWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            claims: Claims::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` for `url` at `path`, or at a disambiguated sibling
    ///
    /// # Returns
    ///
    /// * `Ok(PagePath)` - Where the page was actually written
    /// * `Err(OutputError)` - No free name, or the write failed
    pub async fn write_page(
        &self,
        path: &PagePath,
        url: &Url,
        content: &str,
    ) -> OutputResult<PagePath> {
        let candidates = (0..).map(|n| {
            let mut candidate = path.clone();
            if n > 0 {
                candidate.stem = format!("{}-{}", path.stem, n);
            }
            let relative = candidate.relative_path();
            (candidate, relative)
        });

        let claimed = self
            .claims
            .claim(url.as_str(), candidates)
            .ok_or_else(|| OutputError::Collision(path.relative_path()))?;

        if claimed != *path {
            tracing::debug!(
                "{} maps to {}, already taken; writing {}",
                url,
                path.to_slash_string(),
                claimed.to_slash_string()
            );
        }

        let relative = claimed.relative_path();
        if let Err(e) = write_file(&self.root.join(&relative), content.as_bytes()).await {
            self.claims.release(&relative);
            return Err(e);
        }

        Ok(claimed)
    }

    /// Writes a file owned by the crawl itself (index, report)
    pub async fn write_root_file(&self, name: &str, content: &str) -> OutputResult<PathBuf> {
        let path = self.root.join(name);
        write_file(&path, content.as_bytes()).await?;
        Ok(path)
    }
}

/// Writes downloaded assets under `assets/<kind>/`
#[derive(Debug)]
pub struct AssetWriter {
    root: PathBuf,
    claims: Claims,
}

impl AssetWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            claims: Claims::default(),
        }
    }

    /// Writes the bytes of `url` and returns the path relative to the root
    pub async fn write_asset(
        &self,
        url: &Url,
        kind: AssetKind,
        bytes: &[u8],
    ) -> OutputResult<PathBuf> {
        let path = asset_path(url, kind);
        let candidates = (0..).map(|n| {
            let candidate = if n == 0 {
                path.clone()
            } else {
                numbered(&path, n)
            };
            (candidate.clone(), candidate)
        });

        let claimed = self
            .claims
            .claim(url.as_str(), candidates)
            .ok_or_else(|| OutputError::Collision(path.clone()))?;

        if let Err(e) = write_file(&self.root.join(&claimed), bytes).await {
            self.claims.release(&claimed);
            return Err(e);
        }

        Ok(claimed)
    }
}

/// `dir/name.ext` becomes `dir/name_<n>.ext`
fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

async fn write_file(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| OutputError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, bytes)
        .await
        .map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::PathMapper;
    use tempfile::TempDir;

    fn mapper() -> PathMapper {
        PathMapper::new(Url::parse("https://docs.example.com/").unwrap(), "md")
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_page_creates_directories() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path());
        let page = url("https://docs.example.com/guide/setup/install");

        let written = writer
            .write_page(&mapper().map(&page), &page, "# Install\n")
            .await
            .unwrap();

        assert_eq!(written.to_slash_string(), "guide/setup/install.md");
        let content = std::fs::read_to_string(dir.path().join("guide/setup/install.md")).unwrap();
        assert_eq!(content, "# Install\n");
        assert!(!dir.path().join("guide/setup/install.md.part").exists());
    }

    #[tokio::test]
    async fn test_colliding_pages_disambiguated() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path());
        let first = url("https://docs.example.com/a/b");
        let second = url("https://docs.example.com/a/b/");
        assert_eq!(mapper().map(&first), mapper().map(&second));

        let p1 = writer
            .write_page(&mapper().map(&first), &first, "first")
            .await
            .unwrap();
        let p2 = writer
            .write_page(&mapper().map(&second), &second, "second")
            .await
            .unwrap();

        assert_eq!(p1.to_slash_string(), "a/b.md");
        assert_eq!(p2.to_slash_string(), "a/b-1.md");
        assert_eq!(std::fs::read_to_string(dir.path().join("a/b.md")).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(dir.path().join("a/b-1.md")).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_same_url_reuses_its_path() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path());
        let page = url("https://docs.example.com/a");
        let path = mapper().map(&page);

        writer.write_page(&path, &page, "v1").await.unwrap();
        let again = writer.write_page(&path, &page, "v2").await.unwrap();

        assert_eq!(again, path);
    }

    #[tokio::test]
    async fn test_asset_collisions() {
        let dir = TempDir::new().unwrap();
        let writer = AssetWriter::new(dir.path());

        let a = writer
            .write_asset(&url("https://cdn.one.com/logo.png"), AssetKind::Image, b"one")
            .await
            .unwrap();
        let b = writer
            .write_asset(&url("https://cdn.two.com/logo.png"), AssetKind::Image, b"two")
            .await
            .unwrap();

        assert_eq!(a, Path::new("assets/images/logo.png"));
        assert_eq!(b, Path::new("assets/images/logo_1.png"));
        assert_eq!(std::fs::read(dir.path().join(&b)).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_write_failure_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("guide"), "a file, not a directory").unwrap();
        let writer = PageWriter::new(dir.path());
        let page = url("https://docs.example.com/guide/intro");

        let result = writer.write_page(&mapper().map(&page), &page, "x").await;
        assert!(matches!(result, Err(OutputError::Write { .. })));
    }

    #[test]
    fn test_numbered() {
        assert_eq!(
            numbered(Path::new("assets/css/site.min.css"), 2),
            Path::new("assets/css/site.min_2.css")
        );
        assert_eq!(numbered(Path::new("assets/other/blob"), 1), Path::new("assets/other/blob_1"));
    }
}
