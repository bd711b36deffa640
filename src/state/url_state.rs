//! Per-URL frontier state
//!
//! Transitions only move forward: `Unseen -> Queued -> Visited`. A URL is
//! marked visited when it is dequeued, not when it is enqueued. The one
//! exception is an in-flight item abandoned by cancellation, which returns
//! from `Visited` to `Queued` so a resumed run fetches it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Never offered to the frontier, or rejected by its filters
    Unseen,

    /// Waiting in the pending queue
    Queued,

    /// Dequeued for fetching
    Visited,
}

impl UrlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unseen => "unseen",
            Self::Queued => "queued",
            Self::Visited => "visited",
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
