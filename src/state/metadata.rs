//! The persisted run ledger
//!
//! Serialized as `<outputDir>/metadata.json`:
//!
//! ```json
//! {
//!   "pages": { "<url>": { "url", "framework", "filePath", "contentHash", "depth", "lastCrawled" } },
//!   "lastCrawl": "...",
//!   "stats": { "totalPages", "newPages", "updatedPages", "skippedPages", "errors", "startTime", "endTime" },
//!   "crawlState": { ... }
//! }
//! ```

use crate::state::{timestamp, Session};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One crawled page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,

    /// Logical group the page was filed under
    pub framework: String,

    pub file_path: String,

    /// Hex SHA-256 of the stabilized page text
    pub content_hash: String,

    pub depth: u32,

    #[serde(with = "timestamp")]
    pub last_crawled: DateTime<Utc>,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlStatistics {
    /// Pages crawled successfully (new + updated + skipped)
    pub total_pages: u64,
    pub new_pages: u64,
    pub updated_pages: u64,
    pub skipped_pages: u64,
    pub errors: u64,

    #[serde(
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
}

impl CrawlStatistics {
    pub fn started() -> Self {
        Self {
            start_time: Some(timestamp::now()),
            ..Self::default()
        }
    }

    /// `end - start`, or `None` while either is missing
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn record_new(&mut self) {
        self.total_pages += 1;
        self.new_pages += 1;
    }

    pub fn record_updated(&mut self) {
        self.total_pages += 1;
        self.updated_pages += 1;
    }

    pub fn record_skipped(&mut self) {
        self.total_pages += 1;
        self.skipped_pages += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Adds another run's counters; timestamps span both runs
    pub fn absorb(&mut self, other: &CrawlStatistics) {
        self.total_pages += other.total_pages;
        self.new_pages += other.new_pages;
        self.updated_pages += other.updated_pages;
        self.skipped_pages += other.skipped_pages;
        self.errors += other.errors;
        self.start_time = earliest(self.start_time, other.start_time);
        self.end_time = latest(self.end_time, other.end_time);
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// The run ledger: page records, last statistics, optional session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlMetadata {
    #[serde(default)]
    pub pages: BTreeMap<String, PageRecord>,

    #[serde(with = "timestamp")]
    pub last_crawl: DateTime<Utc>,

    #[serde(default)]
    pub stats: CrawlStatistics,

    /// Present only while a crawl is interruptible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_state: Option<Session>,
}

impl Default for CrawlMetadata {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
            last_crawl: timestamp::now(),
            stats: CrawlStatistics::default(),
            crawl_state: None,
        }
    }
}

impl CrawlMetadata {
    pub fn record(&self, url: &str) -> Option<&PageRecord> {
        self.pages.get(url)
    }

    /// Inserts or overwrites the record keyed by its URL
    pub fn upsert(&mut self, record: PageRecord) {
        self.pages.insert(record.url.clone(), record);
    }

    /// Bumps `lastCrawled` for a page that was fetched but not rewritten
    pub fn touch(&mut self, url: &str, at: DateTime<Utc>) {
        if let Some(record) = self.pages.get_mut(url) {
            record.last_crawled = at;
        }
    }

    /// An active session is the only evidence of an interrupted run
    pub fn active_session(&self) -> Option<&Session> {
        self.crawl_state.as_ref().filter(|s| s.is_active)
    }
}
