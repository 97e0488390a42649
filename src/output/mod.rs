//! Output module for writing the mirror to disk
//!
//! This module handles:
//! - Writing converted pages and downloaded assets without silent overwrites
//! - Generating the `_index.md` table of contents
//! - Generating the crawl report (`_report.md` and console summary)

mod index;
mod persist;
mod report;

pub use index::{format_index, INDEX_FILE};
pub use persist::{AssetWriter, PageWriter};
pub use report::{format_markdown_report, print_report, CrawlReport, REPORT_FILE};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No free file name left for {}", .0.display())]
    Collision(PathBuf),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
