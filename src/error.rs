//! Error types for copilot-chatlog.
//!
//! Only conditions that stop an invocation live here. Malformed turns and
//! segments are absorbed by the parser and surface as diagnostic notes
//! instead (see [`crate::parsers::Note`]).

use std::path::PathBuf;

use thiserror::Error;

use crate::sort::EntityKind;

/// Errors raised by the scan, parse, sort and export stages.
#[derive(Error, Debug)]
pub enum ChatlogError {
    /// The resolved workspace storage directory does not exist
    #[error("workspace storage directory not found: {}", .path.display())]
    StorageNotFound { path: PathBuf },

    /// No storage override was given and the platform has no default location
    #[error("no default workspace storage directory for this platform; use --storage")]
    NoDefaultStorage,

    /// A session file is not a JSON document at all
    #[error("cannot parse session file {}: {source}", .path.display())]
    SessionParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The requested sort attribute is not registered for the entity kind
    #[error("unknown {kind} sort key '{key}' (valid keys: {})", .valid.join(", "))]
    UnknownSortKey {
        kind: EntityKind,
        key: String,
        valid: Vec<&'static str>,
    },

    /// No identifier starts with the given fragment
    #[error("{kind} not found: {fragment}")]
    IdentifierNotFound { kind: EntityKind, fragment: String },

    /// More than one identifier starts with the given fragment
    #[error("ambiguous {kind} id '{fragment}' matches: {}", .candidates.join(", "))]
    AmbiguousIdentifier {
        kind: EntityKind,
        fragment: String,
        candidates: Vec<String>,
    },

    /// Export refused because the destination exists and overwrite was not requested
    #[error("destination already exists (use --overwrite to replace it): {}", .path.display())]
    DestinationExists { path: PathBuf },

    /// The export vault or note location is unusable
    #[error("vault error: {0}")]
    Vault(String),

    /// A document could not be written into its text buffer
    #[error("cannot format document: {0}")]
    Format(#[from] std::fmt::Error),

    /// IO errors, tagged with the path being accessed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChatlogError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, ChatlogError>;
