//! HTML parser for extracting text, links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title and description
//! - The page text, converted to Markdown

use crate::engine::markdown::{to_markdown, CHROME};
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Which part of the document is converted to text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentScope {
    /// The first `main`, `article` or `[role=main]` region, without page chrome
    MainContent,

    /// The whole `<body>`
    Body,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// From `<title>`, falling back to the first `<h1>`
    pub title: Option<String>,

    /// From `<meta name="description">`
    pub description: Option<String>,

    /// Markdown text of the selected scope
    pub text: String,

    /// All links found on the page (absolute URLs)
    pub links: Vec<Url>,
}

/// Parses HTML content and extracts text, links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document, chrome included
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
///
/// Links are resolved against `base_url`, which must be the URL the page
/// was actually served from.
///
/// # Example
///
/// ```
/// use docrawl::engine::{parse_html, ContentScope};
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, ContentScope::Body);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url, scope: ContentScope) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let description = extract_description(&document);
    let links = extract_links(&document, base_url);
    let text = extract_text(&document, base_url, scope);

    ParsedPage {
        title,
        description,
        text,
        links,
    }
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(text).filter(|s| !s.is_empty())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    select_first(document, "title")
        .and_then(element_text)
        .or_else(|| select_first(document, "h1").and_then(element_text))
}

fn extract_description(document: &Html) -> Option<String> {
    select_first(document, r#"meta[name="description"]"#)
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(url);
            }
        }
    }

    links
}

fn extract_text(document: &Html, base_url: &Url, scope: ContentScope) -> String {
    let root = match scope {
        ContentScope::MainContent => select_first(document, "main")
            .or_else(|| select_first(document, "article"))
            .or_else(|| select_first(document, "[role=main]"))
            .or_else(|| select_first(document, "body")),
        ContentScope::Body => select_first(document, "body"),
    };

    let Some(root) = root else {
        return String::new();
    };

    match scope {
        ContentScope::MainContent => to_markdown(root, base_url, CHROME),
        ContentScope::Body => to_markdown(root, base_url, &[]),
    }
}
