//! docrawl: a resumable documentation corpus crawler
//!
//! This crate crawls link-graph-shaped documentation sites, converts each
//! page into normalized Markdown text, and keeps enough state on disk to
//! resume an interrupted crawl and to re-crawl only what changed.

pub mod config;
pub mod crawler;
pub mod engine;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for crawl operations
///
/// Only failures that make a run ill-defined surface here. Anything that
/// can be attributed to a single page or a single checkpoint is absorbed
/// by the coordinator and reflected in the run statistics instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid start URL {url}: {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("Output directory {} is not writable: {source}", path.display())]
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Sub-run '{name}' failed: {message}")]
    SubRunFailed { name: String, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_all, run_target, Coordinator, MultiRunReport};
pub use state::{CrawlMetadata, CrawlStatistics, PageRecord, Session};
pub use url::{normalize_url, CanonicalUrl};
