//! URL handling module
//!
//! This module provides URL canonicalization, the allow-listed prefix
//! filter, and the slug/group naming used for on-disk page files.

mod matcher;
mod normalize;
mod slug;

pub use matcher::{matches_prefix, PrefixSet};
pub use normalize::{normalize_parsed, normalize_url, CanonicalUrl};
pub use slug::{group_for, sanitize, slug_for, INDEX_SLUG, ROOT_GROUP};

use crate::UrlError;
use url::Url;

/// Resolves a link found on a page against that page's own URL
///
/// Returns `None` for links the crawler never follows: empty hrefs,
/// same-page fragments, `javascript:`, `mailto:`, `tel:` and `data:`
/// schemes, and anything that does not resolve to http(s).
pub fn resolve_link(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let resolved = page_url.join(href).ok()?;
    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Some(resolved)
    } else {
        None
    }
}

/// Validates and canonicalizes a crawl's start URL
pub fn parse_start_url(raw: &str, keep_query: bool) -> Result<CanonicalUrl, UrlError> {
    normalize_url(raw, keep_query)
}
