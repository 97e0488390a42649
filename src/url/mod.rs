//! URL handling module for Doc-Mirror
//!
//! This module provides URL normalization, same-origin checks and the path
//! mapping that turns page and asset URLs into locations in the mirror.

mod domain;
mod normalize;
mod path;

// Re-export main functions
pub use domain::{extract_domain, same_origin};
pub use normalize::{normalize_absolute, normalize_url};
pub use path::{asset_path, slugify, url_extension, AssetKind, PagePath, PathMapper};
