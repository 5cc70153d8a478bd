//! CLI definitions and command implementations for chatlog.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use copilot_chatlog::locator::Flavor;
use std::path::PathBuf;

/// chatlog - Browse and export GitHub Copilot chat history from VS Code
#[derive(Parser, Debug)]
#[command(name = "chatlog")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Without --workspace the workspaces are listed. With --workspace the \
chat sessions of that workspace are listed, and adding --chat shows one conversation. \
Identifiers may be abbreviated to any unique prefix.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub options: GlobalOptions,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// workspaceStorage directory (default: VS Code's per-user location)
    #[arg(long, global = true, value_name = "DIR", env = "CHATLOG_STORAGE")]
    pub storage: Option<PathBuf>,

    /// VS Code build whose storage is read: stable or insiders
    #[arg(long, global = true, value_name = "FLAVOR")]
    pub flavor: Option<Flavor>,

    /// Config file (default: ~/.config/copilot-chatlog/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Parse input but do not print anything
    #[arg(long, global = true)]
    pub parse_only: bool,

    /// Do not sanitize Markdown text
    #[arg(long, global = true)]
    pub no_sanitize: bool,

    /// Sort key; prefix with '-' for descending (see `chatlog sortkeys`)
    #[arg(short, long, global = true, value_name = "KEY", allow_hyphen_values = true)]
    pub sort: Option<String>,

    /// Reverse the sort order
    #[arg(short, long, global = true)]
    pub reverse: bool,

    /// Show raw JSON of each request and response instead of rendered text
    #[arg(long, global = true, conflicts_with = "raw_all")]
    pub raw: bool,

    /// Show the whole raw JSON record of each turn
    #[arg(long, global = true)]
    pub raw_all: bool,

    /// Workspace ID (or unique prefix)
    #[arg(short, long, global = true, value_name = "ID")]
    pub workspace: Option<String>,

    /// Chat session ID (or unique prefix); requires --workspace
    #[arg(short, long, global = true, value_name = "ID")]
    pub chat: Option<String>,

    /// Include parser diagnostics for malformed turns
    #[arg(long, global = true)]
    pub notes: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List workspaces, or the chat sessions of a workspace (default)
    List,

    /// Same as list; with --chat, show the conversation
    View,

    /// Show the sort keys for the current listing
    Sortkeys,

    /// Write a conversation to a Markdown file or an Obsidian note
    Export(ExportArgs),

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Destination Markdown file; takes precedence over the vault options
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Replace an existing destination
    #[arg(long, alias = "note-overwrite")]
    pub overwrite: bool,

    /// Full path to the vault; overrides --vault-name and --vault-basedir
    #[arg(long, value_name = "DIR", env = "OBSIDIAN_VAULT")]
    pub vault: Option<PathBuf>,

    /// Name of the vault directory
    #[arg(long, value_name = "NAME", env = "OBSIDIAN_VAULT_NAME")]
    pub vault_name: Option<String>,

    /// Parent directory of vaults (default: ~/Documents)
    #[arg(long, value_name = "DIR", env = "OBSIDIAN_VAULT_BASEDIR")]
    pub vault_basedir: Option<PathBuf>,

    /// Skip vault validation; only the directory must exist
    #[arg(long)]
    pub vault_noverify: bool,

    /// Note folder relative to the vault root
    #[arg(long, value_name = "RELPATH", env = "OBSIDIAN_NOTE_FOLDER")]
    pub note_folder: Option<PathBuf>,

    /// Note title (without ".md")
    #[arg(long, value_name = "TITLE")]
    pub note_title: Option<String>,

    /// Note path relative to the vault; overrides --note-folder and --note-title
    #[arg(long, value_name = "FILE")]
    pub note: Option<PathBuf>,

    /// Frontmatter tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

impl ExportArgs {
    /// Whether any vault option was given on the command line or environment.
    pub fn targets_vault(&self) -> bool {
        self.vault.is_some()
            || self.vault_name.is_some()
            || self.note.is_some()
            || self.note_title.is_some()
    }
}
