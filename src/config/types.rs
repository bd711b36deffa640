use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "target", default)]
    pub targets: Vec<Target>,
}

impl Config {
    /// Finds a target by name
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// The directory a target writes to unless it resumes elsewhere:
    /// its `output-dir`, else `<base-dir>/<name>`
    pub fn default_output_dir(&self, target: &Target) -> PathBuf {
        target
            .output_dir
            .clone()
            .unwrap_or_else(|| self.output.base_dir.join(&target.name))
    }

    /// Whether `dir` is the default output directory of a target other
    /// than `name`
    pub fn claimed_by_other(&self, name: &str, dir: &Path) -> bool {
        let dir = lexical(dir);
        self.targets
            .iter()
            .filter(|t| t.name != name)
            .any(|t| lexical(&self.default_output_dir(t)) == dir)
    }
}

/// Path with `.` components dropped, for comparing configured directories
pub(crate) fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Crawler behavior configuration shared by every target
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of pages visited per target
    pub max_pages: usize,

    /// Maximum number of link hops from the start URL
    pub max_depth: u32,

    /// Total fetch attempts per page
    pub retry_count: u32,

    /// Fixed delay between attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Politeness delay between consecutive fetches (milliseconds)
    pub request_delay_ms: u64,

    /// Upper bound on a single fetch attempt (seconds)
    pub fetch_timeout_secs: u64,

    /// Pages between session checkpoints
    pub checkpoint_every: usize,

    /// Seconds between session checkpoints
    pub checkpoint_interval_secs: u64,

    /// Fetch attempts between engine recycles
    pub recycle_every: u64,

    /// Pages between progress log lines
    pub progress_every: usize,

    /// Rewrite every page even if its fingerprint is unchanged
    pub force_recrawl: bool,

    /// Adopt an interrupted session instead of starting fresh
    pub resume: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 15_000,
            max_depth: 15,
            retry_count: 3,
            retry_delay_ms: 1_000,
            request_delay_ms: 500,
            fetch_timeout_secs: 30,
            checkpoint_every: 20,
            checkpoint_interval_secs: 60,
            recycle_every: 50,
            progress_every: 10,
            force_recrawl: false,
            resume: true,
        }
    }
}

impl CrawlerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "docrawl".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.name, self.version)
        } else {
            format!("{}/{} (+{})", self.name, self.version, self.contact_url)
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Default output root; each target writes to `<base-dir>/<target-name>`
    pub base_dir: PathBuf,

    /// Additional output roots scanned for resumable sessions
    pub search_roots: Vec<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./corpus"),
            search_roots: Vec::new(),
        }
    }
}

/// The content family a target is crawled as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Script-heavy HTML, converted from its main content region
    Rendered,
    /// Plain HTML, converted from the whole body
    Http,
    /// JSON documentation API mapped from the human-facing URL
    Api,
    /// XML sitemaps, RSS and Atom feeds
    Feed,
}

/// One independently crawled documentation type
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Target {
    pub name: String,

    pub kind: EngineKind,

    pub start_url: String,

    /// Allowed URL prefixes; derived from the start URL's origin when empty
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,

    /// Explicit output directory, bypassing resume lookup and defaults
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Keep query strings in canonical URLs
    #[serde(default)]
    pub keep_query: bool,

    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Path inserted before the page path to form the JSON endpoint
    #[serde(default)]
    pub api_path_prefix: String,

    /// Suffix appended to the page path to form the JSON endpoint
    #[serde(default)]
    pub api_suffix: String,
}

/// Limits after applying per-target overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_pages: usize,
    pub max_depth: u32,
}

impl Target {
    pub fn new(name: &str, kind: EngineKind, start_url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            start_url: start_url.to_string(),
            allowed_prefixes: Vec::new(),
            output_dir: None,
            keep_query: false,
            max_pages: None,
            max_depth: None,
            api_path_prefix: String::new(),
            api_suffix: String::new(),
        }
    }

    pub fn limits(&self, crawler: &CrawlerConfig) -> Limits {
        Limits {
            max_pages: self.max_pages.unwrap_or(crawler.max_pages),
            max_depth: self.max_depth.unwrap_or(crawler.max_depth),
        }
    }
}
