//! Command implementations for the chatlog CLI.
//!
//! Mode is chosen from the identifiers given:
//! - no `--workspace`: list workspaces
//! - `--workspace`: list the chat sessions of one workspace
//! - `--workspace` + `--chat`: show one conversation

use super::{Cli, Commands, ExportArgs, GlobalOptions};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use copilot_chatlog::config::{default_config_path, Config, VaultConfig};
use copilot_chatlog::export::{ConsoleSink, FileSink, ObsidianVault, Sink, VaultOptions};
use copilot_chatlog::extractors::{list_workspaces, Workspace};
use copilot_chatlog::formatters::markdown::format_timestamp;
use copilot_chatlog::formatters::{render, RawMode, RenderOptions};
use copilot_chatlog::locator::{resolve_storage_root, Flavor};
use copilot_chatlog::parsers::{self, list_sessions, ParseOptions, Session, VSCodeCopilotParser};
use copilot_chatlog::sort::{describe_sort_keys, resolve, Entity, EntityKind, SortSpec};
use std::path::{Path, PathBuf};

/// Options resolved from flags, environment and the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    storage: Option<PathBuf>,
    flavor: Flavor,
    render: RenderOptions,
    parse_only: bool,
    reverse: bool,
    workspace_sort: Option<SortSpec>,
    session_sort: Option<SortSpec>,
}

impl Settings {
    pub fn new(options: &GlobalOptions, config: &Config) -> Self {
        let raw = if options.raw {
            RawMode::Turns
        } else if options.raw_all {
            RawMode::All
        } else {
            RawMode::None
        };

        let cli_sort = options.sort.as_deref().map(SortSpec::parse);
        let sort_spec = |configured: Option<&str>| {
            cli_sort
                .clone()
                .or_else(|| configured.map(SortSpec::parse))
                .map(|spec| spec.reversed(options.reverse))
        };

        Self {
            storage: options.storage.clone().or_else(|| config.storage_path.clone()),
            flavor: options.flavor.unwrap_or(config.flavor),
            render: RenderOptions {
                sanitize: config.sanitize && !options.no_sanitize,
                raw,
                notes: options.notes,
            },
            parse_only: options.parse_only,
            reverse: options.reverse,
            workspace_sort: sort_spec(config.workspace_sort.as_deref()),
            session_sort: sort_spec(config.session_sort.as_deref()),
        }
    }

    fn storage_root(&self) -> Result<PathBuf> {
        Ok(resolve_storage_root(self.storage.as_deref(), self.flavor)?)
    }
}

/// Run the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let Cli { command, options } = cli;

    if options.chat.is_some() && options.workspace.is_none() {
        bail!("If --chat is specified, --workspace must also be specified.");
    }

    if let Some(Commands::Config { init }) = command {
        return show_config(options.config.as_deref(), init);
    }

    let config = Config::load_from(options.config.as_deref())?;
    let settings = Settings::new(&options, &config);

    match command.unwrap_or(Commands::List) {
        Commands::List | Commands::View => match (&options.workspace, &options.chat) {
            (None, _) => show_workspaces(&settings),
            (Some(workspace), None) => show_sessions(&settings, workspace),
            (Some(workspace), Some(chat)) => show_chat(&settings, workspace, chat),
        },
        Commands::Sortkeys => {
            let kind = if options.workspace.is_some() {
                EntityKind::Session
            } else {
                EntityKind::Workspace
            };
            print_sortkeys(kind);
            Ok(())
        }
        Commands::Export(args) => {
            let (Some(workspace), Some(chat)) = (&options.workspace, &options.chat) else {
                bail!("export requires --workspace and --chat");
            };
            export(&settings, &config.vault, workspace, chat, &args)
        }
        Commands::Config { init } => show_config(options.config.as_deref(), init),
    }
}

/// Sort a listing by the resolved spec; `--reverse` alone reverses scan order.
fn apply_sort<T: Entity>(items: Vec<T>, spec: Option<&SortSpec>, reverse: bool) -> Result<Vec<T>> {
    match spec {
        Some(spec) => Ok(spec.apply(items)?),
        None if reverse => Ok(items.into_iter().rev().collect()),
        None => Ok(items),
    }
}

/// List all workspaces with chat sessions.
fn show_workspaces(settings: &Settings) -> Result<()> {
    let root = settings.storage_root()?;
    let workspaces = list_workspaces(&root)?;
    let workspaces = apply_sort(workspaces, settings.workspace_sort.as_ref(), settings.reverse)?;

    if settings.parse_only {
        tracing::info!("Scanned {} workspaces", workspaces.len());
        return Ok(());
    }

    println!("{}", "Available Workspaces".cyan().bold());
    println!("  Workspace storage: {}", root.display());
    println!(
        "  Workspaces with chat sessions: {}\n",
        workspaces.len().to_string().green().bold()
    );

    println!(
        "{}",
        format!(
            "{:<10} {:<19} {:<19} {:>5}  {}",
            "ID", "Created", "Last Updated", "Chats", "Workspace Folder"
        )
        .bold()
    );
    for ws in &workspaces {
        println!(
            "{:<10} {:<19} {:<19} {:>5}  {}",
            ellipsis_id(&ws.id).cyan(),
            format_timestamp(ws.created),
            format_timestamp(ws.last_update),
            ws.session_count(),
            ws.folder.as_deref().unwrap_or("-").dimmed()
        );
    }

    Ok(())
}

/// List the chat sessions of one workspace.
fn show_sessions(settings: &Settings, fragment: &str) -> Result<()> {
    let workspace = select_workspace(settings, fragment)?;
    let parser = VSCodeCopilotParser::default();
    let (summaries, errors) = list_sessions(&parser, &workspace);
    let summaries = apply_sort(summaries, settings.session_sort.as_ref(), settings.reverse)?;

    if settings.parse_only {
        tracing::info!(
            "Parsed {} sessions in workspace {} ({} failed)",
            summaries.len(),
            workspace.id,
            errors.len()
        );
        return Ok(());
    }

    println!("{}", "Workspace Details".cyan().bold());
    println!("  Workspace ID: {}", workspace.id);
    println!(
        "  Workspace Folder: {}",
        workspace.folder.as_deref().unwrap_or("-")
    );
    println!("  Created: {}", format_timestamp(workspace.created));
    println!("  Last Updated: {}", format_timestamp(workspace.last_update));
    println!(
        "  Chat Sessions: {}\n",
        summaries.len().to_string().green().bold()
    );

    println!(
        "{}",
        format!(
            "{:<10} {:<19} {:<19} {:>6} {:>8}  {}",
            "Chat ID", "Created", "Last Updated", "Turns", "Size", "Title"
        )
        .bold()
    );
    for s in &summaries {
        let title: String = s.title.as_deref().unwrap_or("").chars().take(50).collect();
        println!(
            "{:<10} {:<19} {:<19} {:>6} {:>8}  {}",
            ellipsis_id(&s.id).cyan(),
            format_timestamp(s.created),
            format_timestamp(s.last_update),
            s.turns,
            s.size,
            title.dimmed()
        );
    }

    if !errors.is_empty() {
        println!(
            "\n{} {} session file(s) could not be parsed",
            "!".yellow(),
            errors.len()
        );
    }

    Ok(())
}

/// Show one conversation.
fn show_chat(settings: &Settings, workspace: &str, chat: &str) -> Result<()> {
    let session = load_session(settings, workspace, chat)?;

    for note in session.notes() {
        tracing::debug!("{}: {}", session.id, note);
    }

    if settings.parse_only {
        tracing::info!(
            "Parsed session {} ({} turns, {} notes)",
            session.id,
            session.len(),
            session.notes().count()
        );
        return Ok(());
    }

    let doc = render(&session, &settings.render);
    ConsoleSink::stdout().write(&doc)?;
    Ok(())
}

/// Export one conversation to a file or an Obsidian note.
fn export(
    settings: &Settings,
    vault_config: &VaultConfig,
    workspace: &str,
    chat: &str,
    args: &ExportArgs,
) -> Result<()> {
    let session = load_session(settings, workspace, chat)?;
    let doc = render(&session, &settings.render);

    let uses_vault =
        args.targets_vault() || vault_config.path.is_some() || vault_config.name.is_some();
    let (mut sink, destination): (Box<dyn Sink>, PathBuf) = match &args.output {
        Some(output) => (Box::new(FileSink::new(output, args.overwrite)), output.clone()),
        None if uses_vault => {
            let vault = ObsidianVault::open(&vault_options(args, vault_config))?;
            let note = vault.note_path().to_path_buf();
            (Box::new(vault), note)
        }
        None => bail!(
            "export needs --output FILE or vault options \
             (--vault/--vault-name and --note/--note-title)"
        ),
    };

    if settings.parse_only {
        tracing::info!("Would export session {} to {}", session.id, destination.display());
        return Ok(());
    }

    sink.write(&doc)?;
    println!(
        "{} Exported chat {} to {}",
        "✓".green(),
        ellipsis_id(&session.id).cyan(),
        destination.display()
    );
    Ok(())
}

/// Merge export flags (and their environment defaults) over the config file.
fn vault_options(args: &ExportArgs, config: &VaultConfig) -> VaultOptions {
    VaultOptions {
        vault: args.vault.clone().or_else(|| config.path.clone()),
        basedir: args.vault_basedir.clone().or_else(|| config.basedir.clone()),
        name: args.vault_name.clone().or_else(|| config.name.clone()),
        no_verify: args.vault_noverify,
        note: args.note.clone(),
        note_folder: args.note_folder.clone().or_else(|| config.note_folder.clone()),
        note_title: args.note_title.clone(),
        tags: if args.tags.is_empty() {
            config.tags.clone()
        } else {
            args.tags.clone()
        },
        overwrite: args.overwrite,
    }
}

fn select_workspace(settings: &Settings, fragment: &str) -> Result<Workspace> {
    let root = settings.storage_root()?;
    let workspaces = list_workspaces(&root)?;
    Ok(resolve(&workspaces, fragment)?.clone())
}

/// Resolve workspace and chat fragments and parse the chosen session.
fn load_session(settings: &Settings, workspace: &str, chat: &str) -> Result<Session> {
    let workspace = select_workspace(settings, workspace)?;
    let options = ParseOptions {
        retain_raw: settings.render.raw != RawMode::None,
    };
    Ok(parsers::load_session(&workspace, chat, options)?)
}

fn print_sortkeys(kind: EntityKind) {
    let label = match kind {
        EntityKind::Workspace => "Workspace",
        EntityKind::Session => "Chat",
    };
    println!("{}", format!("{} sort keys:", label).cyan().bold());
    for (name, description) in describe_sort_keys(kind) {
        println!("  {:<10} {}", name.green(), description.dimmed());
    }
    println!("\nPrefix a key with '-' (or pass --reverse) to sort descending.");
}

fn show_config(explicit: Option<&Path>, init: bool) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if init {
        if path.exists() {
            println!("{} Config file already exists: {}", "!".yellow(), path.display());
        } else {
            Config::default().save(&path)?;
            println!("{} Wrote default config to {}", "✓".green(), path.display());
        }
    }

    let config = Config::load_from(explicit)?;
    let status = if path.exists() {
        String::new()
    } else {
        " (not found, using defaults)".dimmed().to_string()
    };
    println!("{} {}{}\n", "Config file:".bold(), path.display(), status);
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Cannot serialize config to TOML")?
    );
    Ok(())
}

/// Shorten an id for tables: first 6 characters plus "...".
fn ellipsis_id(id: &str) -> String {
    if id.chars().count() < 10 {
        id.to_string()
    } else {
        format!("{}...", id.chars().take(6).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use copilot_chatlog::ChatlogError;
    use std::fs;
    use tempfile::TempDir;

    /// Storage root with workspace `ws1` holding the given session files.
    fn storage_with_sessions(files: &[(&str, &str)]) -> (TempDir, Settings) {
        let temp = TempDir::new().unwrap();
        let sessions = temp.path().join("ws1").join("chatSessions");
        fs::create_dir_all(&sessions).unwrap();
        for (name, content) in files {
            fs::write(sessions.join(name), content).unwrap();
        }
        let options = GlobalOptions {
            storage: Some(temp.path().to_path_buf()),
            ..GlobalOptions::default()
        };
        let settings = Settings::new(&options, &Config::default());
        (temp, settings)
    }

    const VALID_SESSION: &str = r#"{"requests": [{"message": {"text": "hi"}, "response": []}]}"#;

    #[test]
    fn test_ellipsis_id() {
        assert_eq!(ellipsis_id("short"), "short");
        assert_eq!(ellipsis_id("0123456789abcdef"), "012345...");
    }

    #[test]
    fn test_settings_precedence() {
        let config = Config {
            sanitize: false,
            session_sort: Some("-updated".to_string()),
            ..Config::default()
        };
        let settings = Settings::new(&GlobalOptions::default(), &config);
        assert!(!settings.render.sanitize);
        assert_eq!(settings.session_sort, Some(SortSpec::parse("-updated")));
        assert!(settings.workspace_sort.is_none());

        let options = GlobalOptions {
            sort: Some("turns".to_string()),
            reverse: true,
            raw_all: true,
            ..GlobalOptions::default()
        };
        let settings = Settings::new(&options, &config);
        assert_eq!(settings.session_sort, Some(SortSpec::parse("-turns")));
        assert_eq!(settings.workspace_sort, Some(SortSpec::parse("-turns")));
        assert_eq!(settings.render.raw, RawMode::All);
    }

    #[test]
    fn test_vault_options_merge() {
        let config = VaultConfig {
            name: Some("Notes".to_string()),
            note_folder: Some(PathBuf::from("copilot")),
            tags: vec!["from-config".to_string()],
            ..VaultConfig::default()
        };
        let args = ExportArgs {
            vault_name: Some("Work".to_string()),
            note_title: Some("chat".to_string()),
            ..ExportArgs::default()
        };
        let options = vault_options(&args, &config);
        assert_eq!(options.name.as_deref(), Some("Work"));
        assert_eq!(options.note_folder, Some(PathBuf::from("copilot")));
        assert_eq!(options.tags, vec!["from-config".to_string()]);
    }

    #[test]
    fn test_reverse_without_key_reverses_scan_order() {
        let ws = |id: &str| Workspace {
            id: id.to_string(),
            path: PathBuf::from(id),
            folder: None,
            created: None,
            last_update: None,
            session_ids: Vec::new(),
        };
        let items = vec![ws("a"), ws("b")];
        let reversed = apply_sort(items, None, true).unwrap();
        assert_eq!(reversed[0].id, "b");
    }

    #[test]
    fn test_chat_requires_workspace() {
        let cli = Cli::try_parse_from(["chatlog", "view", "-c", "abc"]).unwrap();
        let err = run(cli).unwrap_err();
        assert_eq!(
            err.to_string(),
            "If --chat is specified, --workspace must also be specified."
        );
    }

    #[test]
    fn test_unparseable_sibling_keeps_chat_ambiguous() {
        let (_temp, settings) =
            storage_with_sessions(&[("abc111.json", "{ not json"), ("abc222.json", VALID_SESSION)]);

        let err = load_session(&settings, "ws1", "abc").unwrap_err();
        match err.downcast_ref::<ChatlogError>() {
            Some(ChatlogError::AmbiguousIdentifier { candidates, .. }) => {
                let mut candidates = candidates.clone();
                candidates.sort();
                assert_eq!(candidates, vec!["abc111".to_string(), "abc222".to_string()]);
            }
            other => panic!("expected ambiguous chat id, got {:?}", other),
        }

        let err = load_session(&settings, "ws1", "abc1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatlogError>(),
            Some(ChatlogError::SessionParse { .. })
        ));

        let session = load_session(&settings, "ws1", "abc2").unwrap();
        assert_eq!(session.id, "abc222");
        assert_eq!(session.workspace_id.as_deref(), Some("ws1"));
    }

    #[test]
    fn test_export_without_destination_fails() {
        let (temp, settings) = storage_with_sessions(&[("abc111.json", VALID_SESSION)]);

        let err = export(&settings, &VaultConfig::default(), "ws1", "abc", &ExportArgs::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("export needs --output FILE"));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
