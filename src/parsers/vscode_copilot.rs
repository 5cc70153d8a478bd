//! VS Code Copilot Parser
//!
//! Parses `chatSessions/<id>.json` documents written by GitHub Copilot Chat.
//!
//! Document shape (all fields optional):
//! - `sessionId`, `customTitle`, `requesterUsername`, `responderUsername`
//! - `creationDate`, `lastMessageDate`: epoch milliseconds
//! - `requests[]`: `{ message: { text }, response: [segment...], isCanceled,
//!   timestamp, modelId }`
//!
//! Response segments are classified on their `kind` field. Segments without a
//! `kind` but with a string `value` are Markdown text.

use super::{EditSummary, LineRange, Note, ParseOptions, Parser, Segment, Session, Turn};
use crate::error::{ChatlogError, Result};
use crate::extractors::decode_file_uri;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Segment kinds that carry UI bookkeeping rather than conversation content.
pub const SKIPPED_RESPONSE_KINDS: &[&str] = &[
    "undoStop",
    "prepareToolInvocation",
    "toolInvocationSerialized",
    "mcpServersStarting",
    "codeCitation",
    "confirmation",
    "command",
    "progressMessage",
    "progressTaskSerialized",
];

/// VS Code Copilot Parser
#[derive(Debug, Clone, Copy, Default)]
pub struct VSCodeCopilotParser {
    options: ParseOptions,
}

/// Parse one session file from disk.
///
/// Fails with [`ChatlogError::SessionParse`] only when the file is not JSON.
pub fn parse_session(path: &Path, options: ParseOptions) -> Result<Session> {
    VSCodeCopilotParser::new(options).parse(path)
}

impl VSCodeCopilotParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Build a session from an already-decoded document.
    ///
    /// `id` is normally the file stem. Without one, the document's `sessionId`
    /// is used, then a content hash of the document.
    pub fn parse_value(&self, doc: Value, id: Option<&str>) -> Session {
        let id = id
            .map(str::to_string)
            .or_else(|| string_field(&doc, "sessionId"))
            .unwrap_or_else(|| content_id(&doc));

        if !doc.is_object() {
            tracing::warn!("Session {} is not a JSON object; treating it as empty", id);
        }

        let turns: Vec<Turn> = match doc.get("requests") {
            Some(Value::Array(requests)) => requests
                .iter()
                .enumerate()
                .map(|(index, record)| self.parse_turn(index, record))
                .collect(),
            Some(other) if !other.is_null() => {
                tracing::warn!("Session {} has a non-array requests field", id);
                Vec::new()
            }
            _ => Vec::new(),
        };

        let last_turn_ts = turns.iter().filter_map(|t| t.timestamp).max();

        Session {
            title: string_field(&doc, "customTitle"),
            requester: string_field(&doc, "requesterUsername"),
            responder: string_field(&doc, "responderUsername"),
            created: doc.get("creationDate").and_then(millis_to_datetime),
            last_update: doc
                .get("lastMessageDate")
                .and_then(millis_to_datetime)
                .or(last_turn_ts),
            id,
            workspace_id: None,
            path: None,
            turns,
            raw: self.options.retain_raw.then_some(doc),
        }
    }

    fn parse_turn(&self, index: usize, record: &Value) -> Turn {
        if !record.is_object() {
            return Turn {
                request: String::new(),
                response: Vec::new(),
                canceled: false,
                timestamp: None,
                model: None,
                notes: vec![Note {
                    turn: index,
                    message: "turn record is not an object".to_string(),
                }],
                raw: self.options.retain_raw.then(|| record.clone()),
            };
        }

        let mut notes = Vec::new();
        let mut note = |message: String| notes.push(Note { turn: index, message });

        let request = match record.get("message") {
            Some(Value::String(text)) => text.clone(),
            Some(message) => match message.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => {
                    note("request text missing".to_string());
                    String::new()
                }
            },
            None => {
                note("request message missing".to_string());
                String::new()
            }
        };

        let canceled = record
            .get("isCanceled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut response = Vec::new();
        match record.get("response") {
            Some(Value::Array(items)) => {
                for (pos, item) in items.iter().enumerate() {
                    match classify_segment(item) {
                        Ok(Some(segment)) => response.push(segment),
                        Ok(None) => {}
                        Err(reason) => {
                            note(format!("response item {}: {}", pos + 1, reason));
                            if item.is_object() {
                                response.push(Segment::Opaque {
                                    kind: kind_label(item),
                                    raw: item.clone(),
                                });
                            }
                        }
                    }
                }
            }
            // Older releases stored a single `{ value }` object
            Some(Value::Object(obj)) if obj.get("value").is_some_and(Value::is_string) => {
                if let Some(text) = obj.get("value").and_then(Value::as_str) {
                    response.push(Segment::Formatted(text.to_string()));
                }
            }
            Some(Value::Null) | None => {
                if !canceled {
                    note("response missing".to_string());
                }
            }
            Some(_) => note("response is not an array".to_string()),
        }

        if canceled {
            tracing::debug!("Turn {} was canceled", index + 1);
        }

        Turn {
            request,
            response,
            canceled,
            timestamp: record.get("timestamp").and_then(millis_to_datetime),
            model: string_field(record, "modelId"),
            notes,
            raw: self.options.retain_raw.then(|| record.clone()),
        }
    }
}

impl Parser for VSCodeCopilotParser {
    fn source_name(&self) -> &'static str {
        "vscode-copilot"
    }

    fn parse(&self, path: &Path) -> Result<Session> {
        let content = std::fs::read_to_string(path).map_err(|e| ChatlogError::io(path, e))?;
        let doc: Value = serde_json::from_str(&content).map_err(|source| {
            ChatlogError::SessionParse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let file_stem = path.file_stem().and_then(|s| s.to_str());
        let mut session = self.parse_value(doc, file_stem);

        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        session.created = session.created.or(modified);
        session.last_update = session.last_update.or(modified);
        session.path = Some(path.to_path_buf());

        tracing::debug!(
            "Parsed session {} ({} turns, {} notes)",
            session.id,
            session.len(),
            session.notes().count()
        );
        Ok(session)
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "json")
    }
}

/// Map one response item to a segment.
///
/// `Ok(None)` means the item is known bookkeeping and carries no content.
/// `Err` means the item looked like a known kind but its payload was unusable.
fn classify_segment(item: &Value) -> std::result::Result<Option<Segment>, String> {
    let obj = match item {
        Value::String(text) => return Ok(Some(Segment::Plain(text.clone()))),
        Value::Object(obj) => obj,
        _ => return Err("not an object".to_string()),
    };

    let kind = match obj.get("kind") {
        None | Some(Value::Null) => {
            return Ok(Some(match obj.get("value").and_then(Value::as_str) {
                Some(text) => Segment::Formatted(text.to_string()),
                None => Segment::Opaque {
                    kind: kind_label(item),
                    raw: item.clone(),
                },
            }));
        }
        Some(Value::String(kind)) => kind.as_str(),
        Some(_) => {
            return Ok(Some(Segment::Opaque {
                kind: kind_label(item),
                raw: item.clone(),
            }))
        }
    };

    match kind {
        "markdownContent" => content_value(obj)
            .map(|text| Some(Segment::Formatted(text)))
            .ok_or_else(|| "markdownContent without content.value".to_string()),
        "warning" => content_value(obj)
            .map(|text| Some(Segment::Plain(text)))
            .ok_or_else(|| "warning without content.value".to_string()),
        "inlineReference" => inline_reference(obj).map(Some),
        "codeblockUri" => obj
            .get("uri")
            .and_then(uri_string)
            .map(|uri| {
                Some(Segment::CodeRef {
                    label: None,
                    uri: Some(uri),
                    range: None,
                })
            })
            .ok_or_else(|| "codeblockUri without uri".to_string()),
        "textEditGroup" => text_edit_group(obj).map(Some),
        k if SKIPPED_RESPONSE_KINDS.contains(&k) => {
            tracing::debug!("Skipping response kind: {}", k);
            Ok(None)
        }
        k => {
            tracing::info!("Unhandled response kind: {}", k);
            Ok(Some(Segment::Opaque {
                kind: k.to_string(),
                raw: item.clone(),
            }))
        }
    }
}

fn inline_reference(obj: &Map<String, Value>) -> std::result::Result<Segment, String> {
    let reference = obj
        .get("inlineReference")
        .ok_or_else(|| "inlineReference payload missing".to_string())?;

    // Symbol: { name, location: { uri, range } }
    if let Some(name) = reference.get("name").and_then(Value::as_str) {
        let location = reference.get("location");
        return Ok(Segment::CodeRef {
            label: Some(name.to_string()),
            uri: location.and_then(|l| l.get("uri")).and_then(uri_string),
            range: location.and_then(|l| l.get("range")).and_then(line_range),
        });
    }

    // Location: { uri, range }
    if let Some(uri) = reference.get("uri").and_then(uri_string) {
        return Ok(Segment::FileRef {
            path: uri,
            range: reference.get("range").and_then(line_range),
            edits: None,
        });
    }

    // Bare URI
    uri_string(reference)
        .map(|path| Segment::FileRef {
            path,
            range: None,
            edits: None,
        })
        .ok_or_else(|| "inlineReference without name or path".to_string())
}

fn text_edit_group(obj: &Map<String, Value>) -> std::result::Result<Segment, String> {
    let path = obj
        .get("uri")
        .and_then(uri_string)
        .ok_or_else(|| "textEditGroup without uri".to_string())?;
    let groups = obj
        .get("edits")
        .and_then(Value::as_array)
        .ok_or_else(|| "textEditGroup without edits".to_string())?;

    let mut summary = EditSummary::default();
    for group in groups {
        let edits = group
            .as_array()
            .ok_or_else(|| "edit group is not an array".to_string())?;
        for edit in edits {
            let text = edit
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| "edit without text".to_string())?;
            let range = edit
                .get("range")
                .ok_or_else(|| "edit without range".to_string())?;
            let span = line_range(range).ok_or_else(|| "edit range incomplete".to_string())?;

            let empty_range = span.start == span.end
                && range.get("startColumn").and_then(Value::as_u64)
                    == range.get("endColumn").and_then(Value::as_u64)
                && range.get("startColumn").is_some();

            summary.edits += 1;
            summary.added += text.lines().count() as u64;
            if !empty_range {
                summary.deleted += span.end.saturating_sub(span.start) + 1;
            }
        }
    }

    Ok(Segment::FileRef {
        path,
        range: None,
        edits: Some(summary),
    })
}

fn content_value(obj: &Map<String, Value>) -> Option<String> {
    obj.get("content")
        .and_then(|c| c.get("value").or(Some(c)))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Display form of a URI-ish value: a string or `{ fsPath | path | external }`.
fn uri_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(decode_file_uri(s)),
        Value::Object(obj) => ["fsPath", "path", "external"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(decode_file_uri),
        _ => None,
    }
}

fn line_range(value: &Value) -> Option<LineRange> {
    Some(LineRange {
        start: value.get("startLineNumber").and_then(Value::as_u64)?,
        end: value.get("endLineNumber").and_then(Value::as_u64)?,
    })
}

fn kind_label(item: &Value) -> String {
    match item.get("kind") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => other.to_string(),
        None => "untagged".to_string(),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Epoch milliseconds (number or numeric string) to a UTC timestamp.
fn millis_to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let ms = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<f64>().ok()? as i64,
        _ => return None,
    };
    Utc.timestamp_millis_opt(ms).single()
}

/// Stable identifier derived from the document content (keys are sorted).
fn content_id(doc: &Value) -> String {
    let digest = Sha256::digest(doc.to_string().as_bytes());
    digest.iter().take(16).map(|b| format!("{:02x}", b)).collect()
}
