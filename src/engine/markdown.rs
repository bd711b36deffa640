//! HTML to Markdown conversion
//!
//! Walks a parsed element tree and emits Markdown blocks: headings,
//! paragraphs, lists, fenced code, blockquotes, definition lists and
//! tables flattened to pipe rows. Inline links are resolved against the
//! page URL so the text stays meaningful outside its site.

use crate::url::resolve_link;
use scraper::{ElementRef, Node};
use url::Url;

/// Elements never rendered, whatever the scope
pub const ALWAYS_SKIPPED: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "button", "canvas",
];

/// Page chrome dropped when converting only the main content region
pub const CHROME: &[&str] = &["nav", "header", "footer", "aside"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "body", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "ul", "aside",
];

/// Converts the subtree rooted at `root` into Markdown
///
/// `extra_skipped` names elements dropped in addition to [`ALWAYS_SKIPPED`].
pub fn to_markdown(root: ElementRef<'_>, base: &Url, extra_skipped: &[&str]) -> String {
    let mut converter = Converter::new(base, extra_skipped);
    converter.block_children(root);
    converter.finish()
}

struct Converter<'a> {
    base: &'a Url,
    extra_skipped: &'a [&'a str],
    blocks: Vec<String>,
    inline: String,
}

impl<'a> Converter<'a> {
    fn new(base: &'a Url, extra_skipped: &'a [&'a str]) -> Self {
        Self {
            base,
            extra_skipped,
            blocks: Vec::new(),
            inline: String::new(),
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        let mut out = self.blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn skipped(&self, name: &str) -> bool {
        ALWAYS_SKIPPED.contains(&name) || self.extra_skipped.contains(&name)
    }

    fn flush(&mut self) {
        let paragraph = tidy_inline(&self.inline);
        if !paragraph.is_empty() {
            self.blocks.push(paragraph);
        }
        self.inline.clear();
    }

    fn block_children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                let name = child_el.value().name();
                if self.skipped(name) {
                    continue;
                }
                if is_block(name) {
                    self.flush();
                    self.block(child_el);
                } else {
                    let inline = self.inline_of(child_el);
                    self.inline.push_str(&inline);
                }
            } else if let Node::Text(text) = child.value() {
                self.inline.push_str(&collapse_whitespace(text));
            }
        }
    }

    fn block(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = tidy_inline(&self.inline_children(el)).replace('\n', " ");
                if !text.is_empty() {
                    self.blocks.push(format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" | "dt" | "summary" | "figcaption" => {
                let text = tidy_inline(&self.inline_children(el));
                if !text.is_empty() {
                    if name == "dt" {
                        self.blocks.push(format!("**{}**", text));
                    } else {
                        self.blocks.push(text);
                    }
                }
            }
            "pre" => self.code_block(el),
            "ul" | "ol" => {
                let mut lines = Vec::new();
                self.list(el, name == "ol", 0, &mut lines);
                if !lines.is_empty() {
                    self.blocks.push(lines.join("\n"));
                }
            }
            "blockquote" => {
                let mut nested = Converter::new(self.base, self.extra_skipped);
                nested.block_children(el);
                let inner = nested.finish();
                if !inner.trim().is_empty() {
                    let quoted: Vec<String> = inner
                        .trim_end()
                        .lines()
                        .map(|line| {
                            if line.is_empty() {
                                ">".to_string()
                            } else {
                                format!("> {}", line)
                            }
                        })
                        .collect();
                    self.blocks.push(quoted.join("\n"));
                }
            }
            "table" => self.table(el),
            "hr" => self.blocks.push("* * *".to_string()),
            _ => {
                self.block_children(el);
                self.flush();
            }
        }
    }

    fn code_block(&mut self, el: ElementRef<'_>) {
        let language = std::iter::once(el)
            .chain(el.children().filter_map(ElementRef::wrap))
            .filter_map(|e| e.value().attr("class"))
            .flat_map(|classes| classes.split_whitespace())
            .find_map(|class| {
                class
                    .strip_prefix("language-")
                    .or_else(|| class.strip_prefix("lang-"))
            })
            .unwrap_or("");

        let code: String = el.text().collect();
        let code = code.trim_matches('\n').trim_end();
        if !code.is_empty() {
            self.blocks
                .push(format!("```{}\n{}\n```", language, code));
        }
    }

    fn list(&self, el: ElementRef<'_>, ordered: bool, depth: usize, lines: &mut Vec<String>) {
        let items = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li");

        for (index, item) in items.enumerate() {
            let marker = if ordered {
                format!("{}.", index + 1)
            } else {
                "-".to_string()
            };

            let mut text = String::new();
            let mut nested = Vec::new();
            for child in item.children() {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let name = child_el.value().name();
                    if self.skipped(name) {
                        continue;
                    }
                    match name {
                        "ul" | "ol" => nested.push(child_el),
                        _ => {
                            text.push_str(&self.inline_of(child_el));
                            text.push(' ');
                        }
                    }
                } else if let Node::Text(t) = child.value() {
                    text.push_str(&collapse_whitespace(t));
                }
            }

            let text = tidy_inline(&text).replace('\n', " ");
            lines.push(format!("{}{} {}", "  ".repeat(depth), marker, text).trim_end().to_string());

            for sub in nested {
                self.list(sub, sub.value().name() == "ol", depth + 1, lines);
            }
        }
    }

    fn table(&mut self, el: ElementRef<'_>) {
        let mut rows: Vec<String> = Vec::new();

        let table_rows = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr");

        for row in table_rows {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| {
                    tidy_inline(&self.inline_children(c))
                        .replace('\n', " ")
                        .replace('|', "\\|")
                })
                .collect();

            if cells.is_empty() {
                continue;
            }

            rows.push(format!("| {} |", cells.join(" | ")));
            if rows.len() == 1 {
                let separator = vec!["---"; cells.len()].join(" | ");
                rows.push(format!("| {} |", separator));
            }
        }

        if !rows.is_empty() {
            self.blocks.push(rows.join("\n"));
        }
    }

    /// Renders an element in inline context
    fn inline_of(&self, el: ElementRef<'_>) -> String {
        let name = el.value().name();
        if self.skipped(name) {
            return String::new();
        }

        match name {
            "br" => "\n".to_string(),
            "code" | "kbd" | "samp" => {
                let code: String = el.text().collect();
                let code = collapse_whitespace(&code);
                let code = code.trim();
                if code.is_empty() {
                    String::new()
                } else {
                    format!("`{}`", code)
                }
            }
            "strong" | "b" => wrap_emphasis(&self.inline_children(el), "**"),
            "em" | "i" => wrap_emphasis(&self.inline_children(el), "*"),
            "a" => {
                let text = tidy_inline(&self.inline_children(el)).replace('\n', " ");
                let target = el
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_link(href, self.base));
                match target {
                    Some(url) if !text.is_empty() => format!("[{}]({})", text, url),
                    _ => text,
                }
            }
            "img" => el
                .value()
                .attr("alt")
                .map(|alt| alt.trim().to_string())
                .unwrap_or_default(),
            _ if is_block(name) => format!(" {} ", self.inline_children(el)),
            _ => self.inline_children(el),
        }
    }

    fn inline_children(&self, el: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                out.push_str(&self.inline_of(child_el));
            } else if let Node::Text(text) = child.value() {
                out.push_str(&collapse_whitespace(text));
            }
        }
        out
    }
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn wrap_emphasis(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        inner.to_string()
    } else {
        format!("{}{}{}", marker, trimmed, marker)
    }
}

/// Turns every whitespace run into a single space
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Trims each hard line and collapses interior space runs
fn tidy_inline(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
