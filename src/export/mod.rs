//! Export module - Hand rendered documents to an output sink.
//!
//! Sinks:
//! - [`ConsoleSink`]: Markdown to a writer (stdout), headings colored on a TTY
//! - [`FileSink`]: Markdown file; never replaces an existing file unless asked
//! - [`obsidian::ObsidianVault`]: note inside an Obsidian vault, with frontmatter

pub mod obsidian;

use crate::error::{ChatlogError, Result};
use crate::formatters::{write_block, Block, Document};
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

pub use obsidian::{ObsidianVault, VaultOptions};

/// Destination for rendered documents.
pub trait Sink {
    fn write(&mut self, doc: &Document) -> Result<()>;
}

/// Writes Markdown to a terminal or any other writer.
pub struct ConsoleSink<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleSink<std::io::Stdout> {
    /// Stdout, colored when attached to a terminal.
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let color = out.is_terminal();
        Self { out, color }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn write(&mut self, doc: &Document) -> Result<()> {
        let mut text = String::with_capacity(4096);
        for block in &doc.blocks {
            match block {
                Block::Heading { level, text: heading } if self.color => {
                    let marker = "#".repeat(usize::from(*level).max(1));
                    let line = format!("{} {}", marker, heading);
                    let line = if *level <= 1 {
                        line.cyan().bold()
                    } else {
                        line.white().bold()
                    };
                    text.push_str(&format!("{}\n\n", line));
                }
                Block::Placeholder(placeholder) if self.color => {
                    text.push_str(&format!("{}\n\n", placeholder.yellow()));
                }
                Block::Note(note) if self.color => {
                    text.push_str(&format!("{}\n\n", format!("note: {}", note).dimmed()));
                }
                other => write_block(&mut text, other)?,
            }
        }

        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ChatlogError::io("<stdout>", e))
    }
}

/// Writes Markdown to a file path.
#[derive(Debug, Clone)]
pub struct FileSink {
    pub path: PathBuf,
    /// Replace an existing file instead of refusing
    pub overwrite: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            path: path.into(),
            overwrite,
        }
    }

    /// Write `content` to the destination.
    ///
    /// Without `overwrite` the file is created exclusively, so an existing
    /// destination fails with [`ChatlogError::DestinationExists`] and is left
    /// untouched. The handle is closed on every path when it drops.
    pub fn write_content(&self, content: &str) -> Result<()> {
        let mut file = self.open()?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ChatlogError::io(&self.path, e))?;

        tracing::info!("Wrote {} bytes to {}", content.len(), self.path.display());
        Ok(())
    }

    fn open(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        options.write(true);
        if self.overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        options.open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ChatlogError::DestinationExists {
                    path: self.path.clone(),
                }
            } else {
                ChatlogError::io(&self.path, e)
            }
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&mut self, doc: &Document) -> Result<()> {
        self.write_content(&doc.to_markdown()?)
    }
}
