//! JSON documentation API transform
//!
//! Some documentation sites render every human-facing page from a JSON
//! document served at a parallel path. The engine fetches that document
//! and renders its typed content nodes as Markdown.

use crate::engine::{FetchError, PageMetadata, TransformOutput};
use crate::url::{resolve_link, CanonicalUrl};
use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

/// Maps a human-facing page URL to its JSON endpoint
///
/// `<origin><path_prefix><path><suffix>`, with the site root mapped to
/// `/index`. The query string, when kept, is carried over.
pub fn endpoint_for(url: &CanonicalUrl, path_prefix: &str, suffix: &str) -> Result<Url, FetchError> {
    let path = match url.path() {
        "" | "/" => "/index",
        path => path,
    };

    let mut endpoint = format!(
        "{}{}{}{}",
        url.origin(),
        path_prefix.trim_end_matches('/'),
        path,
        suffix
    );
    if let Some(query) = url.as_url().query() {
        endpoint.push('?');
        endpoint.push_str(query);
    }

    Url::parse(&endpoint).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        message: format!("invalid API endpoint {}: {}", endpoint, e),
    })
}

/// Converts a JSON documentation document into text, links and metadata
///
/// Links come from every `url` string in the document and are resolved
/// against `page_url`, the human-facing page.
pub fn transform_json(value: &Value, page_url: &Url) -> TransformOutput {
    let title = value
        .pointer("/metadata/title")
        .or_else(|| value.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let description = value
        .get("abstract")
        .map(|v| Renderer::new(value).inline(v))
        .or_else(|| value.get("description").and_then(Value::as_str).map(str::to_string))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let group = value
        .pointer("/metadata/framework")
        .or_else(|| value.pointer("/metadata/module"))
        .or_else(|| value.pointer("/metadata/modules/0/name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut renderer = Renderer::new(value);
    if let Some(title) = &title {
        renderer.blocks.push(format!("# {}", title));
    }
    if let Some(description) = &description {
        renderer.blocks.push(description.clone());
    }
    for key in ["primaryContentSections", "sections", "content"] {
        if let Some(section) = value.get(key) {
            renderer.block(section);
        }
    }

    let mut text = renderer.blocks.join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }

    let mut links = Vec::new();
    let mut seen = HashSet::new();
    collect_urls(value, page_url, &mut seen, &mut links);

    TransformOutput {
        text,
        links,
        metadata: Some(PageMetadata {
            title,
            description,
            group,
        }),
    }
}

fn collect_urls(value: &Value, page_url: &Url, seen: &mut HashSet<String>, out: &mut Vec<Url>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("url", Value::String(href)) => {
                        if let Some(url) = resolve_link(href, page_url) {
                            if seen.insert(url.to_string()) {
                                out.push(url);
                            }
                        }
                    }
                    _ => collect_urls(child, page_url, seen, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_urls(item, page_url, seen, out);
            }
        }
        _ => {}
    }
}

/// Renders typed content nodes (`heading`, `paragraph`, `codeListing`,
/// lists and inline fragments) to Markdown blocks
struct Renderer<'a> {
    references: Option<&'a Map<String, Value>>,
    blocks: Vec<String>,
}

impl<'a> Renderer<'a> {
    fn new(document: &'a Value) -> Self {
        Self {
            references: document.get("references").and_then(Value::as_object),
            blocks: Vec::new(),
        }
    }

    fn block(&mut self, value: &Value) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.block(item)),
            Value::Object(map) => self.block_node(map),
            Value::String(s) if !s.trim().is_empty() => self.blocks.push(s.trim().to_string()),
            _ => {}
        }
    }

    fn block_node(&mut self, node: &Map<String, Value>) {
        let kind = node.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "heading" => {
                let level = node.get("level").and_then(Value::as_u64).unwrap_or(2).clamp(1, 6);
                if let Some(text) = node.get("text").and_then(Value::as_str) {
                    self.blocks
                        .push(format!("{} {}", "#".repeat(level as usize), text.trim()));
                }
            }
            "paragraph" => {
                let text = node
                    .get("inlineContent")
                    .map(|inline| self.inline(inline))
                    .unwrap_or_default();
                if !text.trim().is_empty() {
                    self.blocks.push(text.trim().to_string());
                }
            }
            "codeListing" => {
                let syntax = node.get("syntax").and_then(Value::as_str).unwrap_or("");
                let code = match node.get("code") {
                    Some(Value::Array(lines)) => lines
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n"),
                    Some(Value::String(code)) => code.clone(),
                    _ => String::new(),
                };
                if !code.trim().is_empty() {
                    self.blocks.push(format!("```{}\n{}\n```", syntax, code.trim_end()));
                }
            }
            "unorderedList" | "orderedList" => {
                let ordered = kind == "orderedList";
                let items = node.get("items").and_then(Value::as_array);
                let lines: Vec<String> = items
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .map(|(index, item)| {
                        let mut nested = Renderer {
                            references: self.references,
                            blocks: Vec::new(),
                        };
                        if let Some(content) = item.get("content") {
                            nested.block(content);
                        }
                        let marker = if ordered {
                            format!("{}.", index + 1)
                        } else {
                            "-".to_string()
                        };
                        format!("{} {}", marker, nested.blocks.join(" "))
                    })
                    .collect();
                if !lines.is_empty() {
                    self.blocks.push(lines.join("\n"));
                }
            }
            "aside" => {
                let mut nested = Renderer {
                    references: self.references,
                    blocks: Vec::new(),
                };
                if let Some(content) = node.get("content") {
                    nested.block(content);
                }
                if !nested.blocks.is_empty() {
                    let quoted: Vec<String> = nested
                        .blocks
                        .join("\n\n")
                        .lines()
                        .map(|line| format!("> {}", line).trim_end().to_string())
                        .collect();
                    self.blocks.push(quoted.join("\n"));
                }
            }
            _ => {
                // Untyped containers such as sections: walk the content-bearing keys
                if let Some(title) = node.get("title").and_then(Value::as_str) {
                    if node.contains_key("content") || node.contains_key("sections") {
                        self.blocks.push(format!("## {}", title.trim()));
                    }
                }
                for key in ["content", "sections"] {
                    match node.get(key) {
                        Some(Value::String(_)) | None => {}
                        Some(child) => self.block(child),
                    }
                }
                if let Some(text) = node.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        self.blocks.push(text.trim().to_string());
                    }
                }
            }
        }
    }

    /// Flattens inline fragments into one line of Markdown
    fn inline(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(|item| self.inline(item)).collect(),
            Value::Object(node) => {
                let kind = node.get("type").and_then(Value::as_str).unwrap_or("");
                let children = || {
                    node.get("inlineContent")
                        .map(|inner| self.inline(inner))
                        .unwrap_or_default()
                };
                match kind {
                    "text" => node
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    "codeVoice" => node
                        .get("code")
                        .and_then(Value::as_str)
                        .map(|code| format!("`{}`", code))
                        .unwrap_or_default(),
                    "emphasis" => format!("*{}*", children()),
                    "strong" => format!("**{}**", children()),
                    "reference" => node
                        .get("identifier")
                        .and_then(Value::as_str)
                        .and_then(|id| self.reference_title(id))
                        .unwrap_or_default(),
                    _ => children(),
                }
            }
            _ => String::new(),
        }
    }

    fn reference_title(&self, identifier: &str) -> Option<String> {
        let reference = self.references?.get(identifier)?;
        let title = reference.get("title").and_then(Value::as_str)?;
        Some(format!("`{}`", title))
    }
}
