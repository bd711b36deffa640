//! Statistics display for single runs, multi-target reports and stored ledgers

use crate::crawler::MultiRunReport;
use crate::state::CrawlStatistics;
use crate::storage::SessionStore;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::path::Path;

/// What a ledger on disk says about its last run
#[derive(Debug, Clone)]
pub struct StoredSummary {
    pub stats: CrawlStatistics,
    pub page_count: usize,
    pub last_crawl: DateTime<Utc>,

    /// An interrupted session is waiting to be resumed
    pub resumable: bool,
}

/// Loads the statistics recorded in an output directory's ledger
///
/// Returns `None` when there is no readable `metadata.json`.
pub async fn load_statistics(output_dir: &Path) -> Option<StoredSummary> {
    let metadata = SessionStore::new(output_dir)
        .try_load_metadata()
        .await
        .ok()
        .flatten()?;

    Some(StoredSummary {
        page_count: metadata.pages.len(),
        last_crawl: metadata.last_crawl,
        resumable: metadata.active_session().is_some(),
        stats: metadata.stats,
    })
}

fn success_rate(stats: &CrawlStatistics) -> f64 {
    let attempted = stats.total_pages + stats.errors;
    if attempted == 0 {
        0.0
    } else {
        stats.total_pages as f64 / attempted as f64 * 100.0
    }
}

/// Renders one run's statistics as text
pub fn format_statistics(name: &str, stats: &CrawlStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", name);
    let _ = writeln!(out, "  Total pages:   {}", stats.total_pages);
    let _ = writeln!(out, "  New:           {}", stats.new_pages);
    let _ = writeln!(out, "  Updated:       {}", stats.updated_pages);
    let _ = writeln!(out, "  Skipped:       {}", stats.skipped_pages);
    let _ = writeln!(out, "  Errors:        {}", stats.errors);
    match stats.duration() {
        Some(duration) => {
            let _ = writeln!(out, "  Duration:      {}s", duration.num_seconds());
        }
        None => {
            let _ = writeln!(out, "  Duration:      n/a");
        }
    }
    let _ = writeln!(out, "  Success rate:  {:.1}%", success_rate(stats));
    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(name: &str, stats: &CrawlStatistics) {
    print!("{}", format_statistics(name, stats));
}

/// Renders a multi-target report: each sub-run, then the totals
pub fn format_report(report: &MultiRunReport) -> String {
    let mut out = String::new();

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(stats) => out.push_str(&format_statistics(&outcome.name, stats)),
            Err(e) => {
                let _ = writeln!(out, "=== {} ===", outcome.name);
                let _ = writeln!(out, "  FAILED: {}", e);
            }
        }
        out.push('\n');
    }

    let total = report.aggregate();
    let _ = writeln!(
        out,
        "{} of {} sub-runs succeeded; {} pages ({} new, {} updated, {} skipped), {} errors",
        report.successes().len(),
        report.outcomes.len(),
        total.total_pages,
        total.new_pages,
        total.updated_pages,
        total.skipped_pages,
        total.errors
    );
    out
}

pub fn print_report(report: &MultiRunReport) {
    print!("{}", format_report(report));
}

/// Renders a stored ledger summary for `--stats`
pub fn format_stored(name: &str, summary: &StoredSummary) -> String {
    let mut out = format_statistics(name, &summary.stats);
    let _ = writeln!(out, "  Pages on disk: {}", summary.page_count);
    let _ = writeln!(
        out,
        "  Last crawl:    {}",
        crate::state::timestamp::format(&summary.last_crawl)
    );
    if summary.resumable {
        let _ = writeln!(out, "  Interrupted session pending resume");
    }
    out
}
