//! Markdown renderer - Turn a parsed [`Session`] into a [`Document`].
//!
//! Layout:
//! ```markdown
//! # Chat Session Details
//! **Workspace ID:** ...
//!
//! ## Request 1
//! How do I ...?
//!
//! ## Copilot Response 1
//! Here's how ...
//!
//! ---
//! ```
//!
//! Consecutive text and inline reference segments are joined into one text
//! block, since VS Code splits a sentence around each reference. Edited files
//! and unsupported content get blocks of their own.

use super::{sanitize_text, Block, Document, DocumentMeta, RawMode, RenderOptions};
use crate::parsers::{Segment, Session, Turn};
use chrono::{DateTime, Local, Utc};
use serde_json::Value;

/// Render a session. Never fails.
pub fn render(session: &Session, options: &RenderOptions) -> Document {
    let mut blocks = vec![
        Block::Heading {
            level: 1,
            text: "Chat Session Details".to_string(),
        },
        Block::Metadata(session_fields(session)),
    ];

    for (index, turn) in session.turns.iter().enumerate() {
        let n = index + 1;
        match options.raw {
            RawMode::None => render_turn(&mut blocks, n, turn, options),
            RawMode::Turns => {
                blocks.push(heading(format!("Request {} (raw JSON input)", n)));
                blocks.push(json_block(turn.raw_request()));
                blocks.push(heading(format!("Copilot Response {} (raw JSON input)", n)));
                blocks.push(json_block(turn.raw_response()));
            }
            RawMode::All => {
                blocks.push(heading(format!("Request & Response {} (raw JSON input)", n)));
                blocks.push(json_block(turn.raw.clone()));
            }
        }

        if options.notes {
            blocks.extend(turn.notes.iter().map(|note| Block::Note(note.to_string())));
        }
        blocks.push(Block::Rule);
    }

    Document {
        meta: DocumentMeta {
            session_id: session.id.clone(),
            workspace_id: session.workspace_id.clone(),
            title: session.summary().title,
            created: session.created,
            last_update: session.last_update,
        },
        blocks,
    }
}

fn render_turn(blocks: &mut Vec<Block>, n: usize, turn: &Turn, options: &RenderOptions) {
    blocks.push(heading(format!("Request {}", n)));
    if !turn.request.is_empty() {
        blocks.push(Block::Text(clean(&turn.request, options)));
    }

    let title = if turn.canceled {
        format!("Copilot Response {} (canceled)", n)
    } else {
        format!("Copilot Response {}", n)
    };
    blocks.push(heading(title));
    if let Some(model) = &turn.model {
        blocks.push(Block::Metadata(vec![("Model".to_string(), model.clone())]));
    }

    let mut text = String::new();
    for segment in &turn.response {
        match segment {
            Segment::Plain(s) | Segment::Formatted(s) => text.push_str(s),
            Segment::CodeRef { label, uri, range } => {
                let range = range.map(|r| r.to_string());
                text.push_str(&code_ref(label.as_deref(), uri.as_deref(), range))
            }
            Segment::FileRef {
                path,
                range,
                edits: None,
            } => match range {
                Some(range) => text.push_str(&format!("`{}` ({})", path, range)),
                None => text.push_str(&format!("`{}`", path)),
            },
            Segment::FileRef {
                path,
                edits: Some(edits),
                ..
            } => {
                flush_text(blocks, &mut text, options);
                blocks.push(Block::Reference(format!(
                    "Edited file: `{}` ({} lines added, {} lines deleted)",
                    path, edits.added, edits.deleted
                )));
            }
            Segment::Opaque { kind, .. } => {
                flush_text(blocks, &mut text, options);
                blocks.push(Block::Placeholder(format!("[unsupported content: {}]", kind)));
            }
        }
    }
    flush_text(blocks, &mut text, options);
}

fn code_ref(label: Option<&str>, uri: Option<&str>, range: Option<String>) -> String {
    let location = match (uri, range) {
        (Some(uri), Some(range)) => Some(format!("{}:{}", uri, range)),
        (Some(uri), None) => Some(uri.to_string()),
        (None, _) => None,
    };
    match (label, location) {
        (Some(label), Some(location)) => format!("`{}` ({})", label, location),
        (Some(label), None) => format!("`{}`", label),
        (None, Some(location)) => format!("[code block: `{}`]", location),
        (None, None) => "[code reference]".to_string(),
    }
}

fn flush_text(blocks: &mut Vec<Block>, text: &mut String, options: &RenderOptions) {
    if !text.trim().is_empty() {
        blocks.push(Block::Text(clean(text, options)));
    }
    text.clear();
}

fn clean(text: &str, options: &RenderOptions) -> String {
    if options.sanitize {
        sanitize_text(text)
    } else {
        text.to_string()
    }
}

fn heading(text: String) -> Block {
    Block::Heading { level: 2, text }
}

fn json_block(value: Option<Value>) -> Block {
    let body = match value {
        Some(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        None => "(raw JSON not retained)".to_string(),
    };
    Block::Code {
        lang: "json".to_string(),
        body,
    }
}

fn session_fields(session: &Session) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(workspace_id) = &session.workspace_id {
        fields.push(("Workspace ID".to_string(), workspace_id.clone()));
    }
    fields.push(("Chat ID".to_string(), session.id.clone()));
    if let Some(title) = &session.title {
        fields.push(("Title".to_string(), title.clone()));
    }
    if let Some(requester) = &session.requester {
        fields.push(("Requester".to_string(), requester.clone()));
    }
    if let Some(responder) = &session.responder {
        fields.push(("Responder".to_string(), responder.clone()));
    }
    fields.push(("Created".to_string(), format_timestamp(session.created)));
    fields.push(("Last Updated".to_string(), format_timestamp(session.last_update)));
    fields.push(("Size (chars)".to_string(), session.size().to_string()));
    fields.push(("Requests".to_string(), session.len().to_string()));
    fields
}

/// Local-time display form used in documents and listings.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
