//! Fetch and transform engines
//!
//! An engine pairs one fetch capability with one transform capability and
//! turns a canonical URL into normalized text, outbound links and optional
//! page metadata. The set of content families is small and fixed, so the
//! engines form a closed enum rather than a trait object.
//!
//! [`EngineHandle`] wraps an engine with its resource policy: heavy
//! per-fetch state is built on [`EngineHandle::acquire`], rebuilt every
//! `recycle_every` fetch attempts regardless of their outcome, and dropped
//! on [`EngineHandle::release`].

mod api;
mod feed;
mod fetcher;
pub mod markdown;
mod parser;

pub use api::{endpoint_for, transform_json};
pub use feed::transform_feed;
pub use fetcher::{build_http_client, fetch_url, HttpContext};
pub use parser::{parse_html, ContentScope, ParsedPage};

use crate::config::{EngineKind, Target, UserAgentConfig};
use crate::url::CanonicalUrl;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";
const FEED_ACCEPT: &str =
    "application/xml,text/xml,application/rss+xml,application/atom+xml,text/html;q=0.8,*/*;q=0.5";

/// A failed fetch attempt for one page
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Could not decode {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could succeed
    ///
    /// Malformed content and client errors (other than 408 and 429) come
    /// back identical on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            FetchError::Decode { .. } => false,
        }
    }
}

/// Raw bytes of one fetch, before any transform
#[derive(Debug, Clone)]
pub struct RawContent {
    /// The page URL the crawler asked for
    pub requested: CanonicalUrl,

    /// Where the content was actually served from, after redirects
    pub final_url: Url,

    pub content_type: String,

    pub body: String,
}

/// Optional page-level metadata reported by a transform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,

    /// Logical grouping, used as the output subdirectory when present
    pub group: Option<String>,
}

/// What a transform produces from one [`RawContent`]
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub text: String,
    pub links: Vec<Url>,
    pub metadata: Option<PageMetadata>,
}

/// Result of [`EngineHandle::crawl`]
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: CanonicalUrl,
    pub final_url: Url,
    pub text: String,
    pub links: Vec<Url>,
    pub metadata: Option<PageMetadata>,
}

impl CrawledPage {
    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref()?.title.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.metadata.as_ref()?.group.as_deref()
    }
}

/// JavaScript-heavy pages: a dedicated render context and main-content extraction
#[derive(Debug)]
pub struct RenderedEngine {
    context: HttpContext,
}

/// Plain HTTP pages converted whole
#[derive(Debug)]
pub struct HttpEngine {
    context: HttpContext,
}

/// Pages whose content is served as JSON from an equivalent endpoint
#[derive(Debug)]
pub struct ApiEngine {
    context: HttpContext,
    path_prefix: String,
    suffix: String,
}

/// Sitemaps, RSS and Atom feeds
#[derive(Debug)]
pub struct FeedEngine {
    context: HttpContext,
}

/// The closed set of engines
#[derive(Debug)]
pub enum Engine {
    Rendered(RenderedEngine),
    Http(HttpEngine),
    Api(ApiEngine),
    Feed(FeedEngine),
}

impl Engine {
    /// Builds the engine configured for a target
    pub fn for_target(target: &Target, user_agent: &UserAgentConfig, timeout: Duration) -> Self {
        let ua = user_agent.clone();
        match target.kind {
            EngineKind::Rendered => Engine::Rendered(RenderedEngine {
                context: HttpContext::new(ua, timeout, HTML_ACCEPT),
            }),
            EngineKind::Http => Engine::Http(HttpEngine {
                context: HttpContext::new(ua, timeout, HTML_ACCEPT),
            }),
            EngineKind::Api => Engine::Api(ApiEngine {
                context: HttpContext::new(ua, timeout, JSON_ACCEPT),
                path_prefix: target.api_path_prefix.clone(),
                suffix: target.api_suffix.clone(),
            }),
            EngineKind::Feed => Engine::Feed(FeedEngine {
                context: HttpContext::new(ua, timeout, FEED_ACCEPT),
            }),
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::Rendered(_) => EngineKind::Rendered,
            Engine::Http(_) => EngineKind::Http,
            Engine::Api(_) => EngineKind::Api,
            Engine::Feed(_) => EngineKind::Feed,
        }
    }

    fn context_mut(&mut self) -> &mut HttpContext {
        match self {
            Engine::Rendered(e) => &mut e.context,
            Engine::Http(e) => &mut e.context,
            Engine::Api(e) => &mut e.context,
            Engine::Feed(e) => &mut e.context,
        }
    }

    fn context(&self) -> &HttpContext {
        match self {
            Engine::Rendered(e) => &e.context,
            Engine::Http(e) => &e.context,
            Engine::Api(e) => &e.context,
            Engine::Feed(e) => &e.context,
        }
    }

    /// Retrieves the raw content behind a page URL
    pub async fn fetch(&mut self, url: &CanonicalUrl) -> Result<RawContent, FetchError> {
        match self {
            Engine::Api(e) => {
                let endpoint = endpoint_for(url, &e.path_prefix, &e.suffix)?;
                e.context.get(url, &endpoint).await
            }
            other => other.context_mut().get(url, url.as_url()).await,
        }
    }

    /// Converts raw content into text, links and metadata
    pub fn transform(&self, raw: &RawContent) -> Result<TransformOutput, FetchError> {
        match self {
            Engine::Rendered(_) => Ok(html_output(raw, ContentScope::MainContent)),
            Engine::Http(_) => Ok(html_output(raw, ContentScope::Body)),
            Engine::Api(_) => {
                let value: serde_json::Value =
                    serde_json::from_str(&raw.body).map_err(|e| FetchError::Decode {
                        url: raw.final_url.to_string(),
                        message: e.to_string(),
                    })?;
                // JSON references point at human pages, not at the endpoint
                Ok(transform_json(&value, raw.requested.as_url()))
            }
            Engine::Feed(_) => transform_feed(raw),
        }
    }

    pub fn acquire(&mut self) -> Result<(), FetchError> {
        self.context_mut().acquire().map(|_| ())
    }

    pub fn recycle(&mut self) -> Result<(), FetchError> {
        self.context_mut().recycle()
    }

    pub fn release(&mut self) {
        self.context_mut().release();
    }

    pub fn memory_usage_estimate(&self) -> usize {
        self.context().memory_usage_estimate()
    }
}

fn html_output(raw: &RawContent, scope: ContentScope) -> TransformOutput {
    let parsed = parse_html(&raw.body, &raw.final_url, scope);
    TransformOutput {
        text: parsed.text,
        links: parsed.links,
        metadata: Some(PageMetadata {
            title: parsed.title,
            description: parsed.description,
            group: None,
        }),
    }
}

/// An engine plus its recycling policy
#[derive(Debug)]
pub struct EngineHandle {
    engine: Engine,
    timeout: Duration,
    recycle_every: u64,
    fetches_since_recycle: u64,
    recycle_count: u64,
}

impl EngineHandle {
    pub fn new(engine: Engine, timeout: Duration, recycle_every: u64) -> Self {
        Self {
            engine,
            timeout,
            recycle_every: recycle_every.max(1),
            fetches_since_recycle: 0,
            recycle_count: 0,
        }
    }

    /// Builds the handle for a target from the crawler settings
    pub fn for_target(
        target: &Target,
        user_agent: &UserAgentConfig,
        crawler: &crate::config::CrawlerConfig,
    ) -> Self {
        let timeout = crawler.fetch_timeout();
        Self::new(
            Engine::for_target(target, user_agent, timeout),
            timeout,
            crawler.recycle_every,
        )
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn acquire(&mut self) -> Result<(), FetchError> {
        self.engine.acquire()
    }

    /// One fetch + transform attempt, bounded by the per-fetch timeout
    ///
    /// Every attempt counts toward the recycle cadence, failed ones included.
    pub async fn crawl(&mut self, url: &CanonicalUrl) -> Result<CrawledPage, FetchError> {
        let fetched = match tokio::time::timeout(self.timeout, self.engine.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        };

        self.fetches_since_recycle += 1;
        if self.fetches_since_recycle >= self.recycle_every {
            if let Err(e) = self.recycle() {
                warn!("Engine recycle failed: {}", e);
            }
        }

        let raw = fetched?;
        let output = self.engine.transform(&raw)?;

        Ok(CrawledPage {
            url: url.clone(),
            final_url: raw.final_url,
            text: output.text,
            links: output.links,
            metadata: output.metadata,
        })
    }

    /// Drops and rebuilds the engine's per-fetch state
    pub fn recycle(&mut self) -> Result<(), FetchError> {
        debug!(
            "Recycling {:?} engine after {} fetches (~{} bytes retained)",
            self.engine.kind(),
            self.fetches_since_recycle,
            self.engine.memory_usage_estimate()
        );
        self.fetches_since_recycle = 0;
        self.recycle_count += 1;
        self.engine.recycle()
    }

    pub fn release(&mut self) {
        self.engine.release();
    }

    pub fn memory_usage_estimate(&self) -> usize {
        self.engine.memory_usage_estimate()
    }

    pub fn fetches_since_recycle(&self) -> u64 {
        self.fetches_since_recycle
    }

    pub fn recycle_count(&self) -> u64 {
        self.recycle_count
    }
}
