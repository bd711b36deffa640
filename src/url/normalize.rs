use crate::UrlError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;

/// A crawl target in canonical form
///
/// Only [`normalize_url`] produces values of this type, so two
/// `CanonicalUrl`s compare equal exactly when they name the same page for
/// deduplication purposes. On-disk locations use
/// [`FilePath`](crate::storage::FilePath) instead and are never routed
/// through this parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// `scheme://host[:port]` without a trailing slash
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for CanonicalUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CanonicalUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Stored URLs were canonical when written; keep any query they carry.
        normalize_url(&raw, true).map_err(serde::de::Error::custom)
    }
}

/// Normalizes a URL into its canonical crawl form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`; require a host
/// 3. Scheme and host are lowercased by the parser
/// 4. Normalize path:
///    - Remove dot segments (`.` and `..`) and empty segments
///    - Remove trailing slash (except for root `/`)
/// 5. Remove fragment
/// 6. Remove the query, or sort its pairs when `keep_query` is set
///
/// # Examples
///
/// ```
/// use docrawl::url::normalize_url;
///
/// let url = normalize_url("https://Example.COM/docs/./a/?x=1#top", false).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/a");
/// ```
pub fn normalize_url(url_str: &str, keep_query: bool) -> Result<CanonicalUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url, keep_query)
}

/// Normalizes an already parsed URL (e.g. a link resolved against its page)
pub fn normalize_parsed(mut url: Url, keep_query: bool) -> Result<CanonicalUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if keep_query && url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    } else {
        url.set_query(None);
    }

    Ok(CanonicalUrl(url))
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}
