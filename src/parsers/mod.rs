//! Parsers module - Rebuild conversations from raw chat session files.
//!
//! Pipeline position:
//! 1. Extractors enumerate workspaces and their session files
//! 2. Parsers read one session file into a [`Session`]
//! 3. Formatters render a [`Session`] into a [`crate::formatters::Document`]
//!
//! The session format is undocumented and varies across Copilot releases, so
//! parsing is best-effort: only a document that is not JSON at all is an
//! error. Everything below the top level degrades to defaults and [`Note`]s.

pub mod vscode_copilot;

use crate::error::{ChatlogError, Result};
use crate::extractors::{SessionSummary, Workspace};
use crate::sort::{resolve_id, EntityKind};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use vscode_copilot::{parse_session, VSCodeCopilotParser};

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u64,
    pub end: u64,
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "L{}", self.start)
        } else {
            write!(f, "L{}-L{}", self.start, self.end)
        }
    }
}

/// Line counts of a file edit proposed by the assistant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditSummary {
    /// Number of edit operations in the group
    pub edits: usize,
    /// Lines of new text
    pub added: u64,
    /// Lines covered by the replaced ranges
    pub deleted: u64,
}

/// One unit of assistant response content.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Unformatted text (status messages, bare strings)
    Plain(String),
    /// Markdown text
    Formatted(String),
    /// Reference to a symbol or code block
    CodeRef {
        label: Option<String>,
        uri: Option<String>,
        range: Option<LineRange>,
    },
    /// Reference to a file, optionally with the edits made to it
    FileRef {
        path: String,
        range: Option<LineRange>,
        edits: Option<EditSummary>,
    },
    /// Anything the parser does not recognize; rendered as a placeholder
    Opaque { kind: String, raw: Value },
}

impl Segment {
    /// Characters of readable text carried by this segment.
    pub fn text_len(&self) -> usize {
        match self {
            Segment::Plain(text) | Segment::Formatted(text) => text.chars().count(),
            _ => 0,
        }
    }
}

/// A non-fatal parse diagnostic attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// 0-based index of the turn the note belongs to
    pub turn: usize,
    pub message: String,
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn {}: {}", self.turn + 1, self.message)
    }
}

/// One request/response exchange.
#[derive(Debug, Clone)]
pub struct Turn {
    /// User prompt (empty when the record had none)
    pub request: String,
    /// Assistant response segments in source order
    pub response: Vec<Segment>,
    /// The user stopped the response before it finished
    pub canceled: bool,
    pub timestamp: Option<DateTime<Utc>>,
    /// Model that produced the response, if recorded
    pub model: Option<String>,
    pub notes: Vec<Note>,
    /// Source record, kept only when raw retention is requested
    pub raw: Option<Value>,
}

impl Turn {
    /// Request plus response text length in characters.
    pub fn size(&self) -> usize {
        self.request.chars().count() + self.response.iter().map(Segment::text_len).sum::<usize>()
    }

    /// Raw request record without its response array.
    pub fn raw_request(&self) -> Option<Value> {
        let mut raw = self.raw.clone()?;
        if let Some(obj) = raw.as_object_mut() {
            obj.remove("response");
        }
        Some(raw)
    }

    /// Raw response array as recorded.
    pub fn raw_response(&self) -> Option<Value> {
        self.raw
            .as_ref()
            .map(|r| r.get("response").cloned().unwrap_or(Value::Null))
    }
}

/// A fully parsed chat session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID (file stem)
    pub id: String,
    /// ID of the workspace the file was read from (back-reference only)
    pub workspace_id: Option<String>,
    /// Source file, when parsed from disk
    pub path: Option<PathBuf>,
    pub title: Option<String>,
    pub requester: Option<String>,
    pub responder: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    /// Turns in source order
    pub turns: Vec<Turn>,
    /// Whole source document, kept only when raw retention is requested
    pub raw: Option<Value>,
}

impl Session {
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total request + response characters.
    pub fn size(&self) -> usize {
        self.turns.iter().map(Turn::size).sum()
    }

    /// All diagnostic notes in turn order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.turns.iter().flat_map(|t| t.notes.iter())
    }

    /// Lightweight listing record for this session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            workspace_id: self.workspace_id.clone(),
            path: self.path.clone().unwrap_or_default(),
            title: self.title.clone().or_else(|| {
                self.turns
                    .iter()
                    .map(|t| t.request.trim())
                    .find(|r| !r.is_empty())
                    .map(truncate_title)
            }),
            created: self.created,
            last_update: self.last_update,
            turns: self.len(),
            size: self.size(),
        }
    }
}

/// Options controlling what a parser keeps besides the conversation model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep source JSON alongside the parsed model for diagnostic display
    pub retain_raw: bool,
}

/// Trait for session parsers.
pub trait Parser {
    /// Source name this parser handles
    fn source_name(&self) -> &'static str;

    /// Parse a single session file.
    fn parse(&self, path: &Path) -> Result<Session>;

    /// Check if this parser can handle the given file.
    fn can_parse(&self, path: &Path) -> bool;
}

/// List the sessions of a workspace.
///
/// Each file is parsed, summarized and dropped, so the listing never holds
/// session bodies. Returns (summaries, errors); a file that fails does not
/// stop its siblings.
pub fn list_sessions(
    parser: &dyn Parser,
    workspace: &Workspace,
) -> (Vec<SessionSummary>, Vec<(PathBuf, ChatlogError)>) {
    let mut summaries = Vec::new();
    let mut errors = Vec::new();

    for id in &workspace.session_ids {
        let path = workspace.session_path(id);
        if !parser.can_parse(&path) {
            continue;
        }

        match parser.parse(&path) {
            Ok(mut session) => {
                session.workspace_id = Some(workspace.id.clone());
                summaries.push(session.summary());
            }
            Err(e) => {
                tracing::warn!("Skipping session {}: {}", path.display(), e);
                errors.push((path, e));
            }
        }
    }

    tracing::debug!(
        "Listed {} {} sessions in workspace {} ({} failed)",
        summaries.len(),
        parser.source_name(),
        workspace.id,
        errors.len()
    );
    (summaries, errors)
}

/// Open one session of a workspace by id fragment.
///
/// The fragment is matched against the session file stems, so a file that
/// fails to parse still counts as a candidate. Only the chosen file is parsed.
pub fn load_session(
    workspace: &Workspace,
    fragment: &str,
    options: ParseOptions,
) -> Result<Session> {
    let id = resolve_id(&workspace.session_ids, EntityKind::Session, fragment)?;
    let mut session = parse_session(&workspace.session_path(id), options)?;
    session.workspace_id = Some(workspace.id.clone());
    Ok(session)
}

/// Truncate a prompt to use as a title (max 60 chars, first line only).
fn truncate_title(s: &str) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    let truncated: String = first_line.chars().take(60).collect();
    if first_line.chars().count() > 60 {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(request: &str, response: Vec<Segment>) -> Turn {
        Turn {
            request: request.to_string(),
            response,
            canceled: false,
            timestamp: None,
            model: None,
            notes: Vec::new(),
            raw: None,
        }
    }

    #[test]
    fn test_turn_size_counts_text_only() {
        let t = turn(
            "héllo",
            vec![
                Segment::Formatted("world".to_string()),
                Segment::FileRef {
                    path: "/a/b.rs".to_string(),
                    range: None,
                    edits: None,
                },
            ],
        );
        assert_eq!(t.size(), 10);
    }

    #[test]
    fn test_raw_request_strips_response() {
        let mut t = turn("q", Vec::new());
        t.raw = Some(serde_json::json!({"message": {"text": "q"}, "response": [{"value": "a"}]}));
        let req = t.raw_request().unwrap();
        assert!(req.get("response").is_none());
        assert_eq!(t.raw_response().unwrap()[0]["value"], "a");
    }

    #[test]
    fn test_summary_title_falls_back_to_first_request() {
        let session = Session {
            id: "s1".to_string(),
            workspace_id: None,
            path: None,
            title: None,
            requester: None,
            responder: None,
            created: None,
            last_update: None,
            turns: vec![turn("  ", Vec::new()), turn("How do lifetimes work?\nmore", Vec::new())],
            raw: None,
        };
        let summary = session.summary();
        assert_eq!(summary.title.as_deref(), Some("How do lifetimes work?"));
        assert_eq!(summary.turns, 2);
    }

    #[test]
    fn test_line_range_display() {
        assert_eq!(LineRange { start: 3, end: 3 }.to_string(), "L3");
        assert_eq!(LineRange { start: 3, end: 9 }.to_string(), "L3-L9");
    }

    #[test]
    fn test_truncate_title() {
        let long = "x".repeat(70);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), 63);
        assert!(title.ends_with("..."));
    }
}
