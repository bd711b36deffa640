//! Content change detection
//!
//! Pages are fingerprinted with SHA-256 over a stabilized projection of
//! their transformed text, so that two fetches of the same content at
//! different times hash identically even when the site injects render
//! timestamps or session identifiers.

use crate::state::PageRecord;
use crate::storage::FilePath;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n.*?\r?\n---[ \t]*(?:\r?\n|\z)").expect("valid regex"));

static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?\b",
    )
    .expect("valid regex")
});

static SESSION_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([;?&])(jsessionid|phpsessid|sessionid|session_id|sid)=[A-Za-z0-9._~%-]*")
        .expect("valid regex")
});

static VOLATILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^.*\b(last\s+updated|generated\s+on|generated\s+at|rendered\s+at|rendered\s+on)\b.*$")
        .expect("valid regex")
});

/// Outcome of comparing a fresh fingerprint with the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// No prior record exists
    New,
    /// Content changed, the file is missing, or a re-crawl was forced
    Updated,
    /// Stored digest matches and the file is on disk
    Unchanged,
}

impl ChangeDecision {
    pub fn should_write(&self) -> bool {
        !matches!(self, ChangeDecision::Unchanged)
    }
}

/// Fingerprinting and write/skip decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    force_recrawl: bool,
}

impl ChangeDetector {
    pub fn new(force_recrawl: bool) -> Self {
        Self { force_recrawl }
    }

    /// Strips non-deterministic artifacts from page text
    pub fn stabilize(text: &str) -> String {
        let text = FRONT_MATTER.replace(text, "");
        let text = HTML_COMMENT.replace_all(&text, "");
        let text = VOLATILE_LINE.replace_all(&text, "");
        let text = ISO_TIMESTAMP.replace_all(&text, "");
        let text = SESSION_PARAM.replace_all(&text, "$1");

        let mut out = String::with_capacity(text.len());
        let mut blank_run = 0;
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 || out.is_empty() {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(line);
            out.push('\n');
        }

        out.trim_end().to_string()
    }

    /// Hex SHA-256 of the stabilized text
    pub fn fingerprint(text: &str) -> String {
        let digest = Sha256::digest(Self::stabilize(text).as_bytes());
        hex::encode(digest)
    }

    /// Compares a fresh digest against the stored record for the page
    ///
    /// `output_dir` resolves relative file paths recorded in the ledger.
    pub fn decide(
        &self,
        previous: Option<&PageRecord>,
        digest: &str,
        output_dir: &FilePath,
    ) -> ChangeDecision {
        let Some(previous) = previous else {
            return ChangeDecision::New;
        };

        if self.force_recrawl || previous.content_hash != digest {
            return ChangeDecision::Updated;
        }

        let stored = FilePath::from_stored(&previous.file_path);
        let on_disk = if stored.as_path().is_absolute() {
            stored
        } else {
            output_dir.join(stored.as_path())
        };
        if !on_disk.exists() {
            return ChangeDecision::Updated;
        }

        ChangeDecision::Unchanged
    }

    pub fn should_write(
        &self,
        previous: Option<&PageRecord>,
        digest: &str,
        output_dir: &FilePath,
    ) -> bool {
        self.decide(previous, digest, output_dir).should_write()
    }
}
