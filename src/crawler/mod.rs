//! Crawler module: frontier, change detection and orchestration
//!
//! This module contains the core crawling logic, including:
//! - The breadth-first frontier with dedup, depth and prefix filters
//! - Content fingerprinting and write/skip decisions
//! - The single-target crawl loop with retry, checkpoints and cancellation
//! - Concurrent multi-target runs

mod change;
mod coordinator;
mod frontier;
mod multi;

pub use change::{ChangeDecision, ChangeDetector};
pub use coordinator::{locate_output_dir, run_target, Coordinator};
pub use frontier::{EnqueueOutcome, Frontier, FrontierEntry, RejectReason};
pub use multi::{run_all, MultiRunReport, SubRunOutcome};
