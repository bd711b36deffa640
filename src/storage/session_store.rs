//! Persistence of the run ledger and its resumable session
//!
//! Everything lives in one JSON file per output directory. Writes go to a
//! temporary sibling and are renamed into place, so a crash mid-write
//! leaves the previous checkpoint intact.

use crate::state::{timestamp, CrawlMetadata, Session};
use crate::storage::{write_atomic, FilePath, StorageError, StorageResult};
use crate::url::normalize_url;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the ledger file inside an output directory
pub const METADATA_FILE: &str = "metadata.json";

/// An interrupted session found on disk
#[derive(Debug, Clone)]
pub struct ResumableSession {
    pub output_dir: FilePath,
    pub session: Session,
}

/// Reads and writes `<outputDir>/metadata.json`
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: FilePath,
}

impl SessionStore {
    pub fn new(dir: impl Into<FilePath>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &FilePath {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.as_path().join(METADATA_FILE)
    }

    /// Loads the ledger, or an empty one when the file is absent or unreadable
    ///
    /// A ledger whose session block is corrupt keeps its page records and
    /// loses only the session. A ledger that cannot be parsed at all is
    /// replaced by an empty one. Neither case is an error.
    pub async fn load_metadata(&self) -> CrawlMetadata {
        match self.try_load_metadata().await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => CrawlMetadata::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable metadata: {}", e);
                CrawlMetadata::default()
            }
        }
    }

    /// Loads the ledger, surfacing read and parse failures
    pub async fn try_load_metadata(&self) -> StorageResult<Option<CrawlMetadata>> {
        let path = self.metadata_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let mut metadata = match serde_json::from_slice::<CrawlMetadata>(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => match salvage_without_session(&bytes) {
                Some(metadata) => {
                    tracing::warn!(
                        "Discarding corrupt session in {}: {}",
                        path.display(),
                        e
                    );
                    metadata
                }
                None => return Err(StorageError::json(&path, e)),
            },
        };

        if let Some(session) = &metadata.crawl_state {
            if let Err(e) = validate_session(&path, session) {
                tracing::warn!("Discarding session: {}", e);
                metadata.crawl_state = None;
            }
        }

        Ok(Some(metadata))
    }

    /// Loads only the session, `None` if absent, corrupt or invalid
    pub async fn load_session(&self) -> Option<Session> {
        self.try_load_metadata()
            .await
            .map_err(|e| tracing::warn!("No usable session in {}: {}", self.dir, e))
            .ok()
            .flatten()
            .and_then(|metadata| metadata.crawl_state)
    }

    /// Writes the ledger atomically, embedding `session` as `crawlState`
    ///
    /// The session's `lastSaveTime` is stamped before writing. Passing
    /// `None` clears the session block.
    pub async fn save(
        &self,
        metadata: &mut CrawlMetadata,
        session: Option<&mut Session>,
    ) -> StorageResult<()> {
        metadata.crawl_state = session.map(|session| {
            session.last_save_time = timestamp::now();
            session.clone()
        });

        let path = self.metadata_path();
        let bytes =
            serde_json::to_vec_pretty(metadata).map_err(|e| StorageError::json(&path, e))?;
        write_atomic(&path, &bytes).await
    }
}

/// Convenience wrapper for [`SessionStore::load_session`]
pub async fn load_session(dir: &Path) -> Option<Session> {
    SessionStore::new(dir).load_session().await
}

/// Scans output roots for an active session started from `start_url`
///
/// `candidate_dirs` are checked first, in order, then the immediate
/// subdirectories of `base_dir` (sorted by name). The first match wins.
/// The returned directory is rebuilt from the stored string as a
/// [`FilePath`]; if that directory no longer exists, the directory the
/// ledger was found in is used instead.
pub async fn find_resumable(
    candidate_dirs: &[PathBuf],
    base_dir: Option<&Path>,
    start_url: &str,
) -> Option<ResumableSession> {
    let mut seen = HashSet::new();
    let mut dirs: Vec<PathBuf> = Vec::new();

    for dir in candidate_dirs {
        if seen.insert(dir.clone()) {
            dirs.push(dir.clone());
        }
    }

    if let Some(base) = base_dir {
        for dir in list_subdirectories(base).await {
            if seen.insert(dir.clone()) {
                dirs.push(dir);
            }
        }
    }

    for dir in dirs {
        let Some(session) = load_session(&dir).await else {
            continue;
        };

        if !session.is_active || !session.matches_start(start_url) {
            continue;
        }

        let stored = FilePath::from_stored(&session.output_directory);
        let output_dir = if stored.exists() {
            stored
        } else {
            FilePath::new(dir)
        };

        tracing::info!(
            "Found interrupted session for {} in {}",
            start_url,
            output_dir
        );
        return Some(ResumableSession {
            output_dir,
            session,
        });
    }

    None
}

async fn list_subdirectories(base: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(base).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut dirs = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    dirs
}

/// Parses the ledger with its `crawlState` block removed
fn salvage_without_session(bytes: &[u8]) -> Option<CrawlMetadata> {
    let mut value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object_mut()?;
    object.remove("crawlState")?;
    serde_json::from_value(value).ok()
}

/// Schema checks beyond what deserialization enforces
fn validate_session(path: &Path, session: &Session) -> StorageResult<()> {
    let corrupt = |reason: String| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if normalize_url(&session.start_url, true).is_err() {
        return Err(corrupt(format!("invalid startURL '{}'", session.start_url)));
    }

    if session.output_directory.trim().is_empty() {
        return Err(corrupt("empty outputDirectory".to_string()));
    }

    if let Some(entry) = session
        .queue
        .iter()
        .find(|entry| normalize_url(&entry.url, true).is_err())
    {
        return Err(corrupt(format!("invalid queued URL '{}'", entry.url)));
    }

    Ok(())
}
