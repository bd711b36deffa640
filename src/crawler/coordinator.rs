//! Crawler coordinator - single-target crawl orchestration
//!
//! This module contains the main crawl loop for one target, including:
//! - Resolving the output directory and adopting interrupted sessions
//! - Pulling URLs from the frontier in breadth-first order
//! - Fetching with a fixed retry budget and politeness delay
//! - Change detection and page writes
//! - Periodic checkpoints, progress logging and cancellation

use crate::config::{Config, CrawlerConfig, Target};
use crate::crawler::change::{ChangeDecision, ChangeDetector};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::engine::{CrawledPage, EngineHandle, FetchError};
use crate::state::{timestamp, CrawlMetadata, CrawlStatistics, PageRecord, Session};
use crate::storage::{find_resumable, render_document, write_page, FilePath, SessionStore};
use crate::url::{group_for, parse_start_url, slug_for, CanonicalUrl, PrefixSet};
use crate::CrawlError;
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Orchestrates one crawl of one target
///
/// All run state lives here and is owned by a single task, so concurrent
/// runs of different targets never share a frontier or a ledger.
pub struct Coordinator {
    name: String,
    crawler: CrawlerConfig,
    start: CanonicalUrl,
    store: SessionStore,
    metadata: CrawlMetadata,
    session: Session,
    resumed: bool,
    frontier: Frontier,
    engine: EngineHandle,
    detector: ChangeDetector,
    /// Stored `file_path` -> URL of the record that owns it
    file_owners: HashMap<String, String>,
    stats: CrawlStatistics,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Prepares a run: validates the start URL, picks the output
    /// directory, loads the ledger and seeds or restores the frontier
    ///
    /// # Errors
    ///
    /// * `CrawlError::InvalidStartUrl` - the start URL is not an http(s) URL with a host
    /// * `CrawlError::OutputUnwritable` - the output directory cannot be created
    pub async fn new(
        config: &Config,
        target: &Target,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        let crawler = config.crawler.clone();

        let start = parse_start_url(&target.start_url, target.keep_query).map_err(|e| {
            CrawlError::InvalidStartUrl {
                url: target.start_url.clone(),
                reason: e.to_string(),
            }
        })?;

        let output_dir = resolve_output_dir(config, target, &start).await;
        tokio::fs::create_dir_all(output_dir.as_path())
            .await
            .map_err(|source| CrawlError::OutputUnwritable {
                path: output_dir.as_path().to_path_buf(),
                source,
            })?;

        let store = SessionStore::new(output_dir.clone());
        let mut metadata = store.load_metadata().await;

        let prefixes = PrefixSet::new(&target.allowed_prefixes, &start);
        let mut frontier = Frontier::new(prefixes, target.limits(&crawler), target.keep_query);

        let adoptable = crawler.resume
            && metadata
                .active_session()
                .map_or(false, |s| s.matches_start(start.as_str()));

        let (session, resumed) = match metadata.crawl_state.take() {
            Some(mut session) if adoptable => {
                tracing::info!(
                    "[{}] Resuming interrupted crawl: {} queued, {} visited",
                    target.name,
                    session.queue.len(),
                    session.visited.len()
                );
                frontier.restore(&session.queue, session.visited.iter().cloned());
                session.output_directory = output_dir.to_stored();
                (session, true)
            }
            _ => {
                frontier.enqueue(start.as_str(), 0);
                (Session::new(start.as_str(), &output_dir.to_stored()), false)
            }
        };

        if !resumed {
            tracing::info!("[{}] Starting crawl at {} into {}", target.name, start, output_dir);
        }

        let engine = EngineHandle::for_target(target, &config.user_agent, &crawler);
        let file_owners = metadata
            .pages
            .values()
            .map(|record| (record.file_path.clone(), record.url.clone()))
            .collect();

        Ok(Self {
            name: target.name.clone(),
            detector: ChangeDetector::new(crawler.force_recrawl),
            file_owners,
            crawler,
            start,
            store,
            metadata,
            session,
            resumed,
            frontier,
            engine,
            stats: CrawlStatistics::started(),
            cancel,
        })
    }

    pub fn output_dir(&self) -> &FilePath {
        self.store.dir()
    }

    /// Whether an interrupted session was adopted
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Runs the crawl loop until the frontier is exhausted, the page cap
    /// is reached or the run is cancelled
    ///
    /// Page-level failures are counted, never returned.
    pub async fn run(mut self) -> Result<CrawlStatistics, CrawlError> {
        if let Err(e) = self.engine.acquire() {
            tracing::warn!("[{}] Engine acquire failed, will retry lazily: {}", self.name, e);
        }

        let cancel = self.cancel.clone();
        let started = Instant::now();
        let mut last_checkpoint = Instant::now();
        let mut since_checkpoint = 0usize;
        let mut processed = 0usize;
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(entry) = self.frontier.dequeue() else {
                break;
            };

            if processed > 0 && !self.crawler.request_delay().is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.frontier.requeue_front(entry);
                        cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.crawler.request_delay()) => {}
                }
            }

            tracing::debug!("[{}] Crawling {} (depth {})", self.name, entry.url, entry.depth);

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.fetch_with_retry(&entry) => Some(result),
            };

            let Some(result) = fetched else {
                tracing::info!("[{}] Abandoning in-flight fetch of {}", self.name, entry.url);
                self.frontier.requeue_front(entry);
                cancelled = true;
                break;
            };

            match result {
                Ok(page) => self.process_page(&entry, page).await,
                Err(e) => {
                    tracing::warn!("[{}] Giving up on {}: {}", self.name, entry.url, e);
                    self.stats.record_error();
                }
            }

            processed += 1;
            since_checkpoint += 1;

            if processed % self.crawler.progress_every.max(1) == 0 {
                let elapsed = started.elapsed().as_secs_f64().max(0.001);
                tracing::info!(
                    "[{}] {} pages visited, {} queued, {:.1} pages/sec",
                    self.name,
                    self.frontier.visited_count(),
                    self.frontier.len(),
                    processed as f64 / elapsed
                );
            }

            if since_checkpoint >= self.crawler.checkpoint_every
                || last_checkpoint.elapsed() >= self.crawler.checkpoint_interval()
            {
                self.checkpoint().await;
                since_checkpoint = 0;
                last_checkpoint = Instant::now();
            }
        }

        self.finish(cancelled).await
    }

    /// One page with the fixed attempt budget and delay
    async fn fetch_with_retry(&mut self, entry: &FrontierEntry) -> Result<CrawledPage, FetchError> {
        let attempts = self.crawler.retry_count.max(1);
        let mut attempt = 1;

        loop {
            match self.engine.crawl(&entry.url).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    tracing::debug!(
                        "[{}] Attempt {}/{} for {} failed: {}",
                        self.name,
                        attempt,
                        attempts,
                        entry.url,
                        e
                    );
                    tokio::time::sleep(self.crawler.retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn process_page(&mut self, entry: &FrontierEntry, page: CrawledPage) {
        let url = entry.url.as_str();
        let digest = ChangeDetector::fingerprint(&page.text);
        let decision = self
            .detector
            .decide(self.metadata.record(url), &digest, self.store.dir());
        let now = timestamp::now();

        match decision {
            ChangeDecision::Unchanged => {
                tracing::debug!("[{}] Unchanged: {}", self.name, url);
                self.metadata.touch(url, now);
                self.stats.record_skipped();
            }
            ChangeDecision::New | ChangeDecision::Updated => {
                let group = group_for(&entry.url, &self.start, page.group());
                let slug = self.claim_slug(url, &group, slug_for(&entry.url, &self.start));
                let document = render_document(url, page.title(), &now, &page.text);

                match write_page(self.store.dir(), &group, &slug, &document).await {
                    Ok(path) => {
                        tracing::debug!("[{}] Wrote {} ({:?})", self.name, path, decision);
                        let file_path = stored_page_path(&group, &slug);
                        self.file_owners.insert(file_path.clone(), url.to_string());
                        self.metadata.upsert(PageRecord {
                            url: url.to_string(),
                            framework: group.clone(),
                            file_path,
                            content_hash: digest,
                            depth: entry.depth,
                            last_crawled: now,
                        });
                        if decision == ChangeDecision::New {
                            self.stats.record_new();
                        } else {
                            self.stats.record_updated();
                        }
                    }
                    Err(e) => {
                        tracing::warn!("[{}] Failed to write {}: {}", self.name, url, e);
                        self.stats.record_error();
                    }
                }
            }
        }

        let next_depth = entry.depth + 1;
        let mut queued = 0usize;
        for link in &page.links {
            if self.frontier.enqueue(link.as_str(), next_depth).is_queued() {
                queued += 1;
            }
        }
        tracing::trace!("[{}] {} new links from {}", self.name, queued, url);
    }

    /// Keeps `slug` unless another URL already owns `group/slug.md`, as
    /// happens for URLs differing only in case; then a URL digest is appended
    fn claim_slug(&self, url: &str, group: &str, slug: String) -> String {
        match self.file_owners.get(&stored_page_path(group, &slug)) {
            Some(owner) if owner != url => {
                let digest = ChangeDetector::fingerprint(url);
                let unique = format!("{}_{}", slug, &digest[..8]);
                tracing::warn!(
                    "[{}] {} collides with {} on {}/{}.md, writing {}/{}.md",
                    self.name,
                    url,
                    owner,
                    group,
                    slug,
                    group,
                    unique
                );
                unique
            }
            _ => slug,
        }
    }

    /// Persists the frontier and ledger; failure is logged and the run continues
    async fn checkpoint(&mut self) {
        self.frontier.snapshot_into(&mut self.session);
        self.metadata.stats = self.stats.clone();

        let session = if self.crawler.resume {
            Some(&mut self.session)
        } else {
            None
        };

        match self.store.save(&mut self.metadata, session).await {
            Ok(()) => tracing::debug!(
                "[{}] Checkpoint: {} queued, {} visited",
                self.name,
                self.frontier.len(),
                self.frontier.visited_count()
            ),
            Err(e) => tracing::warn!("[{}] Checkpoint failed, will retry: {}", self.name, e),
        }
    }

    async fn finish(mut self, cancelled: bool) -> Result<CrawlStatistics, CrawlError> {
        let now = timestamp::now();
        self.stats.end_time = Some(now);
        self.metadata.stats = self.stats.clone();
        self.metadata.last_crawl = now;
        self.frontier.snapshot_into(&mut self.session);

        let saved = if cancelled && self.crawler.resume {
            tracing::info!(
                "[{}] Crawl cancelled, session kept for resume ({} queued)",
                self.name,
                self.frontier.len()
            );
            self.session.is_active = true;
            self.store
                .save(&mut self.metadata, Some(&mut self.session))
                .await
        } else {
            self.session.is_active = false;
            self.store.save(&mut self.metadata, None).await
        };

        if let Err(e) = saved {
            tracing::warn!("[{}] Final save failed: {}", self.name, e);
        }

        self.engine.release();

        tracing::info!(
            "[{}] Finished: {} pages ({} new, {} updated, {} skipped), {} errors",
            self.name,
            self.stats.total_pages,
            self.stats.new_pages,
            self.stats.updated_pages,
            self.stats.skipped_pages,
            self.stats.errors
        );

        Ok(self.stats)
    }
}

/// `PageRecord.file_path` form: relative to the output directory
fn stored_page_path(group: &str, slug: &str) -> String {
    FilePath::new(group).join(format!("{}.md", slug)).to_stored()
}

/// Output directory: explicit override, else an interrupted session's
/// directory, else `<base-dir>/<target-name>`
///
/// A session directory that is another target's default directory is
/// never adopted, so two sub-runs cannot end up sharing a ledger.
async fn resolve_output_dir(config: &Config, target: &Target, start: &CanonicalUrl) -> FilePath {
    if let Some(dir) = &target.output_dir {
        return FilePath::new(dir);
    }

    if config.crawler.resume {
        if let Some(found) = find_resumable(
            &config.output.search_roots,
            Some(config.output.base_dir.as_path()),
            start.as_str(),
        )
        .await
        {
            if !config.claimed_by_other(&target.name, found.output_dir.as_path()) {
                return found.output_dir;
            }
            tracing::warn!(
                "[{}] Not resuming from {}: it belongs to another target",
                target.name,
                found.output_dir
            );
        }
    }

    FilePath::new(config.default_output_dir(target))
}

/// Where a target's ledger lives, resolved the same way a run resolves it
///
/// An unparsable start URL skips the interrupted-session lookup.
pub async fn locate_output_dir(config: &Config, target: &Target) -> FilePath {
    match parse_start_url(&target.start_url, target.keep_query) {
        Ok(start) => resolve_output_dir(config, target, &start).await,
        Err(_) => FilePath::new(config.default_output_dir(target)),
    }
}

/// Runs one target to completion
///
/// # Example
///
/// ```no_run
/// use docrawl::config::load_config;
/// use docrawl::run_target;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("docrawl.toml"))?;
/// let stats = run_target(&config, &config.targets[0], CancellationToken::new()).await?;
/// println!("{} pages", stats.total_pages);
/// # Ok(())
/// # }
/// ```
pub async fn run_target(
    config: &Config,
    target: &Target,
    cancel: CancellationToken,
) -> Result<CrawlStatistics, CrawlError> {
    Coordinator::new(config, target, cancel).await?.run().await
}
