//! File naming for crawled pages
//!
//! Pages land at `<outputDir>/<group>/<slug>.md`. Both names derive from
//! the page URL relative to the crawl's start URL.

use crate::url::CanonicalUrl;

/// Group used when neither the transform nor the URL path supplies one
pub const ROOT_GROUP: &str = "root";

/// Slug used when the URL reduces to nothing
pub const INDEX_SLUG: &str = "index";

/// Derives the file slug for a page
///
/// Lowercases the URL, strips the scheme, the host (with port) and the
/// start URL's path as known prefixes, then replaces every run of
/// characters outside `[a-z0-9._-]` with `_`, collapses repeated `_` and
/// trims `_` from both ends. An empty result becomes `"index"`.
///
/// # Examples
///
/// ```
/// use docrawl::url::{normalize_url, slug_for};
///
/// let base = normalize_url("https://example.com/docs/", false).unwrap();
/// let page = normalize_url("https://example.com/docs/SwiftUI/View", false).unwrap();
/// assert_eq!(slug_for(&page, &base), "swiftui_view");
/// assert_eq!(slug_for(&base, &base), "index");
/// ```
pub fn slug_for(url: &CanonicalUrl, base: &CanonicalUrl) -> String {
    sanitize(&relative_remainder(url, base)).unwrap_or_else(|| INDEX_SLUG.to_string())
}

/// Derives the group directory for a page
///
/// A group supplied by the transform wins; otherwise the first path
/// segment below the start URL is used, and `"root"` when there is none.
pub fn group_for(url: &CanonicalUrl, base: &CanonicalUrl, metadata_group: Option<&str>) -> String {
    if let Some(group) = metadata_group.and_then(sanitize) {
        return group;
    }

    let remainder = relative_remainder(url, base);
    remainder
        .split(|c| c == '/' || c == '?')
        .find(|segment| !segment.is_empty())
        .filter(|_| remainder.contains('/'))
        .and_then(sanitize)
        .unwrap_or_else(|| ROOT_GROUP.to_string())
}

/// Replaces disallowed character runs with `_`; `None` when nothing is left
pub fn sanitize(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());

    for c in lowered.chars() {
        let allowed = c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-');
        if allowed && c != '_' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The part of the lowercased URL left after stripping scheme, host and
/// the start URL's path
fn relative_remainder(url: &CanonicalUrl, base: &CanonicalUrl) -> String {
    let lowered = url.as_str().to_lowercase();

    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);

    let without_host = match without_scheme.find('/') {
        Some(idx) => &without_scheme[idx..],
        None => "",
    };

    let base_path = base.path().to_lowercase();
    let base_path = base_path.trim_end_matches('/');
    let stripped = if !base_path.is_empty() && same_origin(url, base) {
        strip_path_prefix(without_host, base_path)
    } else {
        without_host
    };

    stripped.trim_matches('/').to_string()
}

fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest,
        _ => path,
    }
}

fn same_origin(a: &CanonicalUrl, b: &CanonicalUrl) -> bool {
    a.origin() == b.origin()
}
