use crate::url::CanonicalUrl;

/// Allow-list of URL prefixes a crawl may visit
///
/// A URL is admitted when its canonical form starts with one of the
/// prefixes, or equals a prefix without its trailing slash (so that
/// `https://x/docs/` admits the canonical `https://x/docs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSet {
    prefixes: Vec<String>,
}

impl PrefixSet {
    /// Builds a prefix set from explicit prefixes, falling back to the
    /// start URL's origin when none are given
    pub fn new(explicit: &[String], start: &CanonicalUrl) -> Self {
        let prefixes: Vec<String> = explicit
            .iter()
            .map(|p| canonical_prefix(p))
            .filter(|p| !p.is_empty())
            .collect();

        if prefixes.is_empty() {
            Self::derive(start)
        } else {
            Self { prefixes }
        }
    }

    /// Derives `scheme://host[:port]/` from the start URL
    pub fn derive(start: &CanonicalUrl) -> Self {
        Self {
            prefixes: vec![format!("{}/", start.origin())],
        }
    }

    pub fn allows(&self, url: &CanonicalUrl) -> bool {
        let candidate = url.as_str();
        self.prefixes
            .iter()
            .any(|prefix| matches_prefix(prefix, candidate))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.prefixes
    }
}

/// Checks whether a URL string falls under a prefix
///
/// # Examples
///
/// ```
/// use docrawl::url::matches_prefix;
///
/// assert!(matches_prefix("https://example.com/docs/", "https://example.com/docs/view"));
/// assert!(matches_prefix("https://example.com/docs/", "https://example.com/docs"));
/// assert!(!matches_prefix("https://example.com/docs/", "https://example.com/blog"));
/// ```
pub fn matches_prefix(prefix: &str, url: &str) -> bool {
    if url.starts_with(prefix) {
        return true;
    }

    let trimmed = prefix.trim_end_matches('/');
    !trimmed.is_empty() && url == trimmed
}

/// Lowercases the scheme and host of a configured prefix so it compares
/// against canonical URLs; the path is left as written
fn canonical_prefix(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(parsed) => {
            let origin = parsed.origin().ascii_serialization();
            let rest = &raw[raw.len().min(scheme_and_authority_len(raw))..];
            let rest = if rest.is_empty() { "/" } else { rest };
            format!("{}{}", origin, rest)
        }
        Err(_) => raw.to_string(),
    }
}

fn scheme_and_authority_len(raw: &str) -> usize {
    match raw.find("://") {
        Some(idx) => {
            let after = idx + 3;
            raw[after..]
                .find('/')
                .map(|slash| after + slash)
                .unwrap_or(raw.len())
        }
        None => 0,
    }
}
