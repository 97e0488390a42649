//! Configuration module for Doc-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so a file only needs the values it changes.
//!
//! # Example
//!
//! ```no_run
//! use doc_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FilterConfig, HttpConfig, LinkMode, OutputConfig, OutputFormat,
    TargetConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, read_config};
pub use validation::validate;
