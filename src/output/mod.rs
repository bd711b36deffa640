//! Output module for human-readable crawl summaries
//!
//! This module handles:
//! - Per-target run statistics
//! - The multi-target run report
//! - Summaries of ledgers already on disk

pub mod stats;

pub use stats::{
    format_report, format_statistics, format_stored, load_statistics, print_report,
    print_statistics, StoredSummary,
};
