//! Crawl frontier
//!
//! This module handles:
//! - The FIFO queue of pending URLs (breadth-first traversal)
//! - Queued and visited dedup sets
//! - Depth, prefix and page-count filtering
//! - Snapshot and restore through a [`Session`]
//!
//! A URL moves `unseen -> queued -> visited` and is marked visited when it
//! is dequeued, not when it is enqueued. At any instant the queued and
//! visited sets are disjoint.

use crate::config::Limits;
use crate::state::{QueueEntry, Session, UrlState};
use crate::url::{normalize_url, CanonicalUrl, PrefixSet};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::trace;

/// A URL waiting in (or just taken from) the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub depth: u32,
}

impl From<&FrontierEntry> for QueueEntry {
    fn from(entry: &FrontierEntry) -> Self {
        QueueEntry {
            url: entry.url.to_string(),
            depth: entry.depth,
        }
    }
}

/// Why an enqueue was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Invalid,
    OutsidePrefixes,
    TooDeep,
    AlreadyQueued,
    AlreadyVisited,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::Invalid => "invalid URL",
            RejectReason::OutsidePrefixes => "outside allowed prefixes",
            RejectReason::TooDeep => "beyond max depth",
            RejectReason::AlreadyQueued => "already queued",
            RejectReason::AlreadyVisited => "already visited",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    Rejected(RejectReason),
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued)
    }
}

/// Pending work plus dedup guards for one run
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    prefixes: PrefixSet,
    limits: Limits,
    keep_query: bool,
}

impl Frontier {
    pub fn new(prefixes: PrefixSet, limits: Limits, keep_query: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            prefixes,
            limits,
            keep_query,
        }
    }

    /// Normalizes `raw` and appends it unless a filter refuses it
    pub fn enqueue(&mut self, raw: &str, depth: u32) -> EnqueueOutcome {
        let outcome = self.try_enqueue(raw, depth);
        if let EnqueueOutcome::Rejected(reason) = outcome {
            trace!("Not queueing {} at depth {}: {}", raw, depth, reason);
        }
        outcome
    }

    fn try_enqueue(&mut self, raw: &str, depth: u32) -> EnqueueOutcome {
        let url = match normalize_url(raw, self.keep_query) {
            Ok(url) => url,
            Err(_) => return EnqueueOutcome::Rejected(RejectReason::Invalid),
        };

        if !self.prefixes.allows(&url) {
            return EnqueueOutcome::Rejected(RejectReason::OutsidePrefixes);
        }
        if depth > self.limits.max_depth {
            return EnqueueOutcome::Rejected(RejectReason::TooDeep);
        }
        if self.visited.contains(url.as_str()) {
            return EnqueueOutcome::Rejected(RejectReason::AlreadyVisited);
        }
        if !self.queued.insert(url.to_string()) {
            return EnqueueOutcome::Rejected(RejectReason::AlreadyQueued);
        }

        self.queue.push_back(FrontierEntry { url, depth });
        EnqueueOutcome::Queued
    }

    /// Pops the oldest entry and marks it visited
    ///
    /// Returns `None` when the queue is empty or `max_pages` URLs have
    /// already been visited.
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        if !self.has_capacity() {
            return None;
        }

        let entry = self.queue.pop_front()?;
        self.queued.remove(entry.url.as_str());
        self.visited.insert(entry.url.to_string());
        Some(entry)
    }

    /// Puts an abandoned in-flight entry back at the head of the queue
    pub fn requeue_front(&mut self, entry: FrontierEntry) {
        let key = entry.url.to_string();
        self.visited.remove(&key);
        if self.queued.insert(key) {
            self.queue.push_front(entry);
        }
    }

    /// Rebuilds the frontier from a persisted session
    ///
    /// Queue entries that were already visited, appear twice or no longer
    /// parse are dropped. Prefix and depth filters are not re-applied: the
    /// entries passed them when first queued.
    pub fn restore(&mut self, queue: &[QueueEntry], visited: impl IntoIterator<Item = String>) {
        self.visited.extend(visited);

        for entry in queue {
            let Ok(url) = normalize_url(&entry.url, self.keep_query) else {
                trace!("Dropping unparsable session entry {}", entry.url);
                continue;
            };
            if self.visited.contains(url.as_str()) || !self.queued.insert(url.to_string()) {
                continue;
            }
            self.queue.push_back(FrontierEntry {
                url,
                depth: entry.depth,
            });
        }
    }

    /// Writes the queue and visited set into a session
    pub fn snapshot_into(&self, session: &mut Session) {
        session.queue = self.queue.iter().map(QueueEntry::from).collect();
        session.visited = self.visited.iter().cloned().collect();
    }

    pub fn state_of(&self, raw: &str) -> UrlState {
        let key = match normalize_url(raw, self.keep_query) {
            Ok(url) => url.to_string(),
            Err(_) => return UrlState::Unseen,
        };
        if self.visited.contains(&key) {
            UrlState::Visited
        } else if self.queued.contains(&key) {
            UrlState::Queued
        } else {
            UrlState::Unseen
        }
    }

    /// Whether another URL may still be dequeued
    pub fn has_capacity(&self) -> bool {
        self.visited.len() < self.limits.max_pages
    }

    pub fn remaining_capacity(&self) -> usize {
        self.limits.max_pages.saturating_sub(self.visited.len())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }
}
