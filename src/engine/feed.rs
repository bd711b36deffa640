//! Sitemap and feed transform
//!
//! Handles `<urlset>`/`<sitemapindex>` sitemaps, RSS `<item>`s and Atom
//! `<entry>`s. A listing page served as HTML falls back to the plain body
//! transform, so flat listings can be crawled as a single fetch.

use crate::engine::{parse_html, ContentScope, FetchError, PageMetadata, RawContent, TransformOutput};
use crate::url::resolve_link;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static LOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid regex"));
static ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item>").expect("valid regex"));
static ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry\b[^>]*>(.*?)</entry>").expect("valid regex"));
static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("valid regex"));
static LINK_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>(.*?)</link>").expect("valid regex"));
static LINK_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static CDATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex"));

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    title: Option<String>,
    url: Url,
}

/// Converts a sitemap or feed into a Markdown list of its entries
pub fn transform_feed(raw: &RawContent) -> Result<TransformOutput, FetchError> {
    if looks_like_html(raw) {
        let parsed = parse_html(&raw.body, &raw.final_url, ContentScope::Body);
        return Ok(TransformOutput {
            text: parsed.text,
            links: parsed.links,
            metadata: Some(PageMetadata {
                title: parsed.title,
                description: parsed.description,
                group: None,
            }),
        });
    }

    if !raw.body.trim_start().starts_with('<') {
        return Err(FetchError::Decode {
            url: raw.final_url.to_string(),
            message: "not an XML sitemap or feed".to_string(),
        });
    }

    let base = &raw.final_url;
    let body = raw.body.as_str();
    let entries = if ITEM.is_match(body) {
        ITEM.captures_iter(body)
            .filter_map(|c| entry_from(&c[1], base, false))
            .collect()
    } else if ENTRY.is_match(body) {
        ENTRY
            .captures_iter(body)
            .filter_map(|c| entry_from(&c[1], base, true))
            .collect()
    } else {
        LOC.captures_iter(body)
            .filter_map(|c| resolve_link(&decode_text(&c[1]), base))
            .map(|url| Entry { title: None, url })
            .collect()
    };
    let entries = dedup(entries);

    let title = feed_title(body);

    let mut lines = Vec::with_capacity(entries.len() + 2);
    if let Some(title) = &title {
        lines.push(format!("# {}", title));
        lines.push(String::new());
    }
    for entry in &entries {
        match &entry.title {
            Some(title) => lines.push(format!("- [{}]({})", title, entry.url)),
            None => lines.push(format!("- <{}>", entry.url)),
        }
    }

    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }

    Ok(TransformOutput {
        text,
        links: entries.into_iter().map(|entry| entry.url).collect(),
        metadata: Some(PageMetadata {
            title,
            ..PageMetadata::default()
        }),
    })
}

fn looks_like_html(raw: &RawContent) -> bool {
    if raw.content_type.to_ascii_lowercase().contains("html") {
        return true;
    }
    let head: String = raw
        .body
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn entry_from(block: &str, base: &Url, atom: bool) -> Option<Entry> {
    let href = if atom {
        LINK_HREF.captures(block).map(|c| c[1].to_string())
    } else {
        LINK_TEXT.captures(block).map(|c| c[1].to_string())
    }?;
    let url = resolve_link(&decode_text(&href), base)?;
    let title = TITLE
        .captures(block)
        .map(|c| decode_text(&c[1]))
        .filter(|t| !t.is_empty());
    Some(Entry { title, url })
}

/// Title of the channel or feed, outside any item
fn feed_title(body: &str) -> Option<String> {
    let first_entry = [ITEM.find(body), ENTRY.find(body)]
        .into_iter()
        .flatten()
        .map(|m| m.start())
        .min()
        .unwrap_or(body.len());
    TITLE
        .captures(&body[..first_entry])
        .map(|c| decode_text(&c[1]))
        .filter(|t| !t.is_empty())
}

fn dedup(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.url.to_string()))
        .collect()
}

/// Unwraps CDATA, decodes the predefined XML entities and collapses whitespace
fn decode_text(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw, "$1");
    let decoded = unwrapped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
