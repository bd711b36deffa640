//! Page text files
//!
//! Each page is written to `<outputDir>/<group>/<slug>.md`, prefixed with
//! a small front matter block. The block carries the crawl timestamp, so
//! fingerprints are always taken over the transformed text, never over the
//! file contents.

use crate::state::timestamp;
use crate::storage::{write_atomic, FilePath, StorageResult};
use chrono::{DateTime, Utc};

/// Builds the file contents for a page
pub fn render_document(
    url: &str,
    title: Option<&str>,
    crawled_at: &DateTime<Utc>,
    text: &str,
) -> String {
    let mut doc = String::with_capacity(text.len() + 128);
    doc.push_str("---\n");
    doc.push_str(&format!("source: {}\n", url));
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        doc.push_str(&format!("title: {}\n", title.replace('\n', " ")));
    }
    doc.push_str(&format!("crawled: {}\n", timestamp::format(crawled_at)));
    doc.push_str("---\n\n");
    doc.push_str(text.trim_end());
    doc.push('\n');
    doc
}

/// Location of a page file inside an output directory
pub fn page_path(output_dir: &FilePath, group: &str, slug: &str) -> FilePath {
    output_dir.join(group).join(format!("{}.md", slug))
}

/// Writes a page file atomically and returns its path
pub async fn write_page(
    output_dir: &FilePath,
    group: &str,
    slug: &str,
    document: &str,
) -> StorageResult<FilePath> {
    let path = page_path(output_dir, group, slug);
    write_atomic(path.as_path(), document.as_bytes()).await?;
    Ok(path)
}
