//! VS Code Copilot Extractor
//!
//! Walks `workspaceStorage/<hash>/` directories. A directory is a workspace
//! when it has a `chatSessions/` subdirectory; anything else under the root is
//! other extension data and is skipped.

use super::{decode_file_uri, Workspace, SESSIONS_DIR, WORKSPACE_METADATA};
use crate::error::{ChatlogError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// VS Code Copilot Extractor
pub struct VSCodeCopilotExtractor {
    /// Resolved `workspaceStorage` directory
    root: PathBuf,
}

impl VSCodeCopilotExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find all workspaces with chat sessions, in directory enumeration order.
    pub fn find_workspaces(&self) -> Result<Vec<Workspace>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| ChatlogError::io(&self.root, e))?;

        let mut workspaces = Vec::new();
        for entry in entries.flatten() {
            let location = entry.path();
            if !location.join(SESSIONS_DIR).is_dir() {
                tracing::debug!("Skipping {}: no {} directory", location.display(), SESSIONS_DIR);
                continue;
            }
            workspaces.push(self.read_workspace(&location));
        }

        tracing::debug!(
            "Found {} workspaces under {}",
            workspaces.len(),
            self.root.display()
        );
        Ok(workspaces)
    }

    /// Build the workspace record for one storage directory.
    pub fn read_workspace(&self, location: &Path) -> Workspace {
        let id = location
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let metadata_path = location.join(WORKSPACE_METADATA);
        let metadata = std::fs::metadata(&metadata_path).ok();

        let (session_ids, session_times) = self.list_session_files(location);

        let metadata_time = metadata.as_ref().and_then(|m| m.modified().ok());
        let last_update = metadata_time
            .into_iter()
            .chain(session_times)
            .max()
            .map(DateTime::<Utc>::from);

        let created = metadata
            .as_ref()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(DateTime::<Utc>::from);

        Workspace {
            folder: metadata.and_then(|_| read_folder(&metadata_path)),
            id,
            path: location.to_path_buf(),
            created,
            last_update,
            session_ids,
        }
    }

    /// Session ids (file stems) and modification times of `*.json` files.
    fn list_session_files(&self, location: &Path) -> (Vec<String>, Vec<SystemTime>) {
        let sessions_dir = location.join(SESSIONS_DIR);
        let mut ids = Vec::new();
        let mut times = Vec::new();

        let entries = match std::fs::read_dir(&sessions_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", sessions_dir.display(), e);
                return (ids, times);
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            ids.push(stem.to_string());
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                times.push(modified);
            }
        }

        (ids, times)
    }
}

/// Project folder recorded in `workspace.json` (`folder`, else `workspace`).
fn read_folder(metadata_path: &Path) -> Option<String> {
    let content = match std::fs::read_to_string(metadata_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", metadata_path.display(), e);
            return None;
        }
    };

    let json: Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Ignoring invalid {}: {}", metadata_path.display(), e);
            return None;
        }
    };

    json.get("folder")
        .or_else(|| json.get("workspace"))
        .and_then(|v| v.as_str())
        .map(decode_file_uri)
}
