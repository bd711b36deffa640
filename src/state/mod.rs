//! State module: the crawler's data model
//!
//! # Components
//!
//! - `PageRecord`, `CrawlMetadata`, `CrawlStatistics`: the persisted run ledger
//! - `Session`, `QueueEntry`: resumable in-flight crawl state
//! - `UrlState`: per-URL frontier state (unseen, queued, visited)

mod metadata;
mod session;
pub mod timestamp;
mod url_state;

// Re-export main types
pub use metadata::{CrawlMetadata, CrawlStatistics, PageRecord};
pub use session::{QueueEntry, Session};
pub use url_state::UrlState;
