//! chatlog - Browse and export GitHub Copilot chat history
//!
//! Reads the chat sessions VS Code keeps under `workspaceStorage` and shows
//! them as workspace listings, session listings or rendered conversations.
//! Nothing is ever written back to the editor's storage.
//!
//! Usage:
//!   chatlog                         - List workspaces with chat sessions
//!   chatlog -w <ID>                 - List chat sessions of a workspace
//!   chatlog view -w <ID> -c <ID>    - Show one conversation
//!   chatlog export -w <ID> -c <ID>  - Write a conversation to a file or vault
//!   chatlog sortkeys                - Show available sort keys

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use colored::Colorize;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.options.verbose) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }

    if let Err(e) = cli::commands::run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("chatlog={}", log_level).parse()?)
                .add_directive(format!("copilot_chatlog={}", log_level).parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
