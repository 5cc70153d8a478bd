//! Formatters module - Render parsed sessions into documents.
//!
//! A [`Document`] is an ordered list of [`Block`]s plus the session metadata
//! export sinks need. Rendering never fails: content the renderer does not
//! understand becomes a visible placeholder block.

pub mod markdown;
pub mod sanitize;

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub use markdown::render;
pub use sanitize::sanitize_text;

/// Which raw JSON, if any, replaces the rendered turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RawMode {
    #[default]
    None,
    /// Request record and response array per turn
    Turns,
    /// Whole turn record per turn
    All,
}

/// Rendering switches supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub sanitize: bool,
    pub raw: RawMode,
    /// Include parser diagnostic notes
    pub notes: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            raw: RawMode::None,
            notes: false,
        }
    }
}

/// One rendered unit of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    /// Label/value lines
    Metadata(Vec<(String, String)>),
    /// Markdown text
    Text(String),
    /// Citation of a file or symbol outside the conversation text
    Reference(String),
    /// Content that was omitted from rendering
    Placeholder(String),
    Code { lang: String, body: String },
    /// Parser diagnostic
    Note(String),
    Rule,
}

/// Session metadata carried alongside the rendered blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub session_id: String,
    pub workspace_id: Option<String>,
    pub title: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
}

/// A rendered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub meta: DocumentMeta,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Placeholder blocks, i.e. content the reader should know was omitted.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Placeholder(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Serialize the blocks as Markdown.
    pub fn to_markdown(&self) -> Result<String> {
        let mut out = String::with_capacity(4096);
        for block in &self.blocks {
            write_block(&mut out, block)?;
        }
        Ok(out)
    }
}

/// Append one block as Markdown.
pub fn write_block(out: &mut String, block: &Block) -> std::fmt::Result {
    match block {
        Block::Heading { level, text } => {
            let marker = "#".repeat(usize::from(*level).max(1));
            writeln!(out, "{} {}\n", marker, text)?;
        }
        Block::Metadata(fields) => {
            for (label, value) in fields {
                writeln!(out, "**{}:** {}  ", label, value)?;
            }
            writeln!(out)?;
        }
        Block::Text(text) | Block::Reference(text) => writeln!(out, "{}\n", text.trim_end())?,
        Block::Placeholder(text) => writeln!(out, "_{}_\n", text)?,
        Block::Code { lang, body } => {
            let fence = code_fence(body);
            writeln!(out, "{}{}", fence, lang)?;
            writeln!(out, "{}", body.trim_end_matches('\n'))?;
            writeln!(out, "{}\n", fence)?;
        }
        Block::Note(text) => writeln!(out, "> note: {}\n", text)?,
        Block::Rule => writeln!(out, "---\n")?,
    }
    Ok(())
}

/// A backtick fence longer than any backtick run inside `body`.
fn code_fence(body: &str) -> String {
    let longest = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}
