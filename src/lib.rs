//! copilot-chatlog - Recover GitHub Copilot chat history from VS Code storage.
//!
//! Pipeline:
//! 1. [`locator`] resolves the `workspaceStorage` root
//! 2. [`extractors`] enumerates workspaces and their session files
//! 3. [`parsers`] rebuilds one session file into a [`parsers::Session`]
//! 4. [`formatters`] renders a session into a [`formatters::Document`]
//! 5. [`export`] hands documents to a console, file or vault sink
//!
//! [`sort`] orders and filters workspace and session listings.

pub mod config;
pub mod error;
pub mod export;
pub mod extractors;
pub mod formatters;
pub mod locator;
pub mod parsers;
pub mod sort;

pub use config::Config;
pub use error::{ChatlogError, Result};
pub use extractors::{list_workspaces, SessionSummary, Workspace};
pub use formatters::{render, Document, RenderOptions};
pub use parsers::{list_sessions, load_session, parse_session, Session};
