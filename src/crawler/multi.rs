//! Multi-target runs
//!
//! Every configured target is crawled as an independent tokio task. The
//! tasks share only the read-only configuration; each owns its frontier,
//! ledger and session, and one failing sub-run never cancels its siblings.

use crate::config::Config;
use crate::crawler::run_target;
use crate::state::CrawlStatistics;
use crate::CrawlError;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of one sub-run
#[derive(Debug)]
pub struct SubRunOutcome {
    pub name: String,
    pub result: Result<CrawlStatistics, CrawlError>,
}

/// Per-target results of [`run_all`], in configuration order
#[derive(Debug, Default)]
pub struct MultiRunReport {
    pub outcomes: Vec<SubRunOutcome>,
}

impl MultiRunReport {
    pub fn successes(&self) -> Vec<(&str, &CrawlStatistics)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|stats| (o.name.as_str(), stats)))
            .collect()
    }

    pub fn failures(&self) -> Vec<(&str, &CrawlError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.name.as_str(), err)))
            .collect()
    }

    /// True only when every sub-run completed; page-level errors inside a
    /// sub-run do not count
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Counters summed over the successful sub-runs
    pub fn aggregate(&self) -> CrawlStatistics {
        let mut total = CrawlStatistics::default();
        for (_, stats) in self.successes() {
            total.absorb(stats);
        }
        total
    }

    /// Process exit status: 0 when every sub-run completed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Crawls every target in `config` concurrently and joins them all
pub async fn run_all(config: Arc<Config>, cancel: CancellationToken) -> MultiRunReport {
    let names: Vec<String> = config.targets.iter().map(|t| t.name.clone()).collect();

    let handles = config.targets.iter().cloned().map(|target| {
        let config = Arc::clone(&config);
        let cancel = cancel.child_token();
        tokio::spawn(async move { run_target(&config, &target, cancel).await })
    });

    let joined = join_all(handles).await;

    let outcomes = names
        .into_iter()
        .zip(joined)
        .map(|(name, joined)| {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(CrawlError::SubRunFailed {
                    name: name.clone(),
                    message: e.to_string(),
                }),
            };
            match &result {
                Ok(stats) => tracing::info!(
                    "Sub-run '{}' completed with {} pages and {} errors",
                    name,
                    stats.total_pages,
                    stats.errors
                ),
                Err(e) => tracing::error!("Sub-run '{}' failed: {}", name, e),
            }
            SubRunOutcome { name, result }
        })
        .collect();

    MultiRunReport { outcomes }
}
