use crate::state::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One pending frontier item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub url: String,
    pub depth: u32,
}

/// Resumable in-flight crawl state
///
/// Stored under `crawlState` in `metadata.json`. `output_directory` is a
/// plain filesystem path string; it is turned back into a path with
/// [`FilePath`](crate::storage::FilePath), never with a URL parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub visited: BTreeSet<String>,

    pub queue: Vec<QueueEntry>,

    #[serde(rename = "startURL")]
    pub start_url: String,

    pub output_directory: String,

    #[serde(with = "timestamp")]
    pub session_start_time: DateTime<Utc>,

    #[serde(with = "timestamp")]
    pub last_save_time: DateTime<Utc>,

    pub is_active: bool,
}

impl Session {
    pub fn new(start_url: &str, output_directory: &str) -> Self {
        let started = timestamp::now();
        Self {
            visited: BTreeSet::new(),
            queue: Vec::new(),
            start_url: start_url.to_string(),
            output_directory: output_directory.to_string(),
            session_start_time: started,
            last_save_time: started,
            is_active: true,
        }
    }

    pub fn matches_start(&self, start_url: &str) -> bool {
        self.start_url == start_url
    }
}
