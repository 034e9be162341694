//! Markdown to Notion block conversion.
//!
//! Covers the subset page bodies actually use: H2/H3 (H4 renders as H3, H1 is
//! dropped because it becomes the page title), dividers, quotes, to-dos, bullet and
//! numbered items, fenced code, pipe tables (as plain-text code) and paragraphs.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Notion rejects rich-text runs longer than this.
pub const MAX_TEXT_LEN: usize = 2000;
/// Children accepted per create/append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

const CODE_LANGUAGES: &[&str] = &[
    "javascript",
    "python",
    "json",
    "bash",
    "sql",
    "typescript",
    "html",
    "css",
    "go",
    "ruby",
    "java",
    "rust",
];

static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(`[^`]+`|\*\*[^*]+\*\*|\*[^*]+\*|_[^_]+_|[^`*_]+)").expect("inline pattern")
});
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").expect("numbered pattern"));

pub fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

fn annotations(bold: bool, italic: bool, code: bool) -> Value {
    json!({
        "bold": bold,
        "italic": italic,
        "code": code,
        "strikethrough": false,
        "underline": false,
        "color": "default",
    })
}

fn text_run(content: &str, bold: bool, italic: bool, code: bool) -> Value {
    json!({
        "type": "text",
        "text": { "content": truncate(content) },
        "annotations": annotations(bold, italic, code),
    })
}

/// Inline `**bold**`, `*italic*` / `_italic_` and `` `code` `` into rich-text runs.
pub fn parse_inline(text: &str) -> Vec<Value> {
    let mut runs = Vec::new();
    for m in INLINE.find_iter(text) {
        let part = m.as_str();
        if part.is_empty() {
            continue;
        }
        let run = if part.len() >= 2 && part.starts_with('`') && part.ends_with('`') {
            text_run(&part[1..part.len() - 1], false, false, true)
        } else if part.len() >= 4 && part.starts_with("**") && part.ends_with("**") {
            text_run(&part[2..part.len() - 2], true, false, false)
        } else if part.len() >= 2
            && ((part.starts_with('*') && part.ends_with('*'))
                || (part.starts_with('_') && part.ends_with('_')))
        {
            text_run(&part[1..part.len() - 1], false, true, false)
        } else {
            text_run(part, false, false, false)
        };
        runs.push(run);
    }
    if runs.is_empty() {
        runs.push(text_run(text, false, false, false));
    }
    runs
}

fn rich_block(kind: &str, text: &str) -> Value {
    json!({
        "object": "block",
        "type": kind,
        kind: { "rich_text": parse_inline(text) },
    })
}

fn code_block(content: &str, language: &str) -> Value {
    json!({
        "object": "block",
        "type": "code",
        "code": {
            "rich_text": [{ "type": "text", "text": { "content": truncate(content) } }],
            "language": language,
        },
    })
}

pub fn markdown_to_blocks(markdown: &str) -> Vec<Value> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.trim().is_empty() || line.starts_with("# ") {
            i += 1;
            continue;
        }

        if let Some(rest) = line.strip_prefix("## ") {
            blocks.push(rich_block("heading_2", rest.trim()));
        } else if let Some(rest) = line.strip_prefix("### ") {
            blocks.push(rich_block("heading_3", rest.trim()));
        } else if let Some(rest) = line.strip_prefix("#### ") {
            blocks.push(rich_block("heading_3", rest.trim()));
        } else if line.trim() == "---" {
            blocks.push(json!({ "object": "block", "type": "divider", "divider": {} }));
        } else if let Some(rest) = line.strip_prefix("> ") {
            blocks.push(rich_block("quote", rest.trim()));
        } else if line.starts_with("- [ ] ") || line.starts_with("- [x] ") {
            let checked = line.starts_with("- [x] ");
            blocks.push(json!({
                "object": "block",
                "type": "to_do",
                "to_do": { "rich_text": parse_inline(line[6..].trim()), "checked": checked },
            }));
        } else if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            blocks.push(rich_block("bulleted_list_item", rest.trim()));
        } else if NUMBERED.is_match(line) {
            let text = NUMBERED.replace(line, "");
            blocks.push(rich_block("numbered_list_item", text.trim()));
        } else if line.starts_with('|') {
            let start = i;
            while i < lines.len() && lines[i].starts_with('|') {
                i += 1;
            }
            blocks.push(code_block(&lines[start..i].join("\n"), "plain text"));
            continue;
        } else if let Some(lang) = line.strip_prefix("```") {
            let lang = lang.trim();
            let language = if CODE_LANGUAGES.contains(&lang) {
                lang
            } else {
                "plain text"
            };
            i += 1;
            let start = i;
            while i < lines.len() && !lines[i].starts_with("```") {
                i += 1;
            }
            blocks.push(code_block(&lines[start..i].join("\n"), language));
            // skip closing fence
            i += 1;
            continue;
        } else {
            blocks.push(rich_block("paragraph", line.trim()));
        }
        i += 1;
    }

    blocks
}
