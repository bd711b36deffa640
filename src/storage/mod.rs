//! Storage module for persisting crawl data
//!
//! This module handles everything the crawler writes to disk:
//! - The run ledger (`metadata.json`) with its embedded resumable session
//! - Lookup of interrupted sessions across known output roots
//! - Page text files under `<outputDir>/<group>/<slug>.md`
//!
//! All writes are atomic: content goes to a temporary sibling first and
//! is renamed over the destination.

mod pages;
mod session_store;
mod traits;

pub use pages::{page_path, render_document, write_page};
pub use session_store::{find_resumable, load_session, ResumableSession, SessionStore, METADATA_FILE};
pub use traits::{FilePath, StorageError, StorageResult};

use std::path::Path;

/// Writes `bytes` to `path` via a temporary file and a rename
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(path, e));
    }

    Ok(())
}
