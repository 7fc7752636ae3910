//! Plain-text rendering of presentations and index listings.

use std::fmt::Write;

use serde_json::Value;

use crate::app::view::Presentation;
use crate::domain::model::{EditorData, IndexEntry};

/// One `icon path` line per entry.
pub fn render_entries(entries: &[IndexEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{} {}", entry.display_icon(), entry.path);
    }
    out
}

pub fn render_presentation(presentation: &Presentation) -> String {
    let mut out = String::new();
    match presentation {
        Presentation::Welcome => {
            out.push_str("Select a folder, document, process, or organigram to get started.\n");
        }
        Presentation::Folder { entries, .. } => {
            if entries.is_empty() {
                out.push_str("(empty folder)\n");
            }
            for entry in entries {
                let _ = writeln!(out, "{} {}", entry.display_icon(), entry.name);
            }
        }
        Presentation::Document { editor_data, .. } => match editor_data {
            Some(data) => out.push_str(&render_blocks(data)),
            None => out.push_str("(no content)\n"),
        },
        Presentation::Process { xml, .. } => match xml {
            Some(xml) => {
                out.push_str(xml.trim_end());
                out.push('\n');
            }
            None => out.push_str("(no diagram yet)\n"),
        },
        Presentation::Organigram { members, .. } => {
            let _ = writeln!(out, "{} members", members.len());
            for member in members {
                let _ = writeln!(out, "- {}", member.name);
            }
        }
        Presentation::Raw { payload, .. } => {
            out.push_str("(editor unavailable, showing stored content)\n");
            out.push_str(payload);
            out.push('\n');
        }
    }
    out
}

/// Text summary of block editor data: one line per block.
fn render_blocks(data: &EditorData) -> String {
    let Some(blocks) = data.get("blocks").and_then(Value::as_array) else {
        return format!("{data}\n");
    };
    if blocks.is_empty() {
        return "(empty document)\n".to_string();
    }
    let mut out = String::new();
    for block in blocks {
        let kind = block.get("type").and_then(Value::as_str).unwrap_or("block");
        let text = block
            .pointer("/data/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let _ = writeln!(out, "[{kind}] {text}");
    }
    out
}
