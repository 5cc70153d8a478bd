//! Extractors module - Discover workspaces and their chat session files.
//!
//! Extractors only look at directory structure, file times and the small
//! `workspace.json` metadata file. Session bodies are left to the parsers.

pub mod vscode_copilot;

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub use vscode_copilot::VSCodeCopilotExtractor;

/// Name of the per-workspace directory holding session files.
pub const SESSIONS_DIR: &str = "chatSessions";

/// Name of the per-workspace metadata file.
pub const WORKSPACE_METADATA: &str = "workspace.json";

/// One `workspaceStorage/<hash>` directory that holds chat sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    /// Storage folder name (a hash chosen by VS Code)
    pub id: String,
    /// Storage folder on disk
    pub path: PathBuf,
    /// Project folder the workspace was opened on, if recorded
    pub folder: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// Newest modification time of the metadata file and session files
    pub last_update: Option<DateTime<Utc>>,
    /// Session file stems in directory order
    pub session_ids: Vec<String>,
}

impl Workspace {
    pub fn sessions_dir(&self) -> PathBuf {
        self.path.join(SESSIONS_DIR)
    }

    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", session_id))
    }

    pub fn session_count(&self) -> usize {
        self.session_ids.len()
    }
}

/// Listing record for one session; the parsed turns are not kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub workspace_id: Option<String>,
    pub path: PathBuf,
    /// Custom title, or the first request line
    pub title: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    /// Number of turns
    pub turns: usize,
    /// Request + response characters
    pub size: usize,
}

/// Enumerate the workspaces under a storage root, in directory order.
pub fn list_workspaces(root: &Path) -> Result<Vec<Workspace>> {
    VSCodeCopilotExtractor::new(root).find_workspaces()
}

/// Convert a `file://` URI into a filesystem path string.
///
/// Non-file URIs (remote, virtual workspaces) are returned unchanged.
pub fn decode_file_uri(uri: &str) -> String {
    let Some(rest) = uri.strip_prefix("file://") else {
        return uri.to_string();
    };

    let decoded = urlencoding::decode(rest)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| rest.to_string());

    // "/c:/Users/..." -> "c:/Users/..."
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
    {
        decoded[1..].to_string()
    } else {
        decoded
    }
}
