//! Obsidian vault export.
//!
//! A vault is located either by its full path or by a parent directory plus
//! vault name. Unless verification is disabled, the directory must look like a
//! vault (`.obsidian/workspace.json`). The note is written with a YAML
//! frontmatter block in front of the rendered document.

use super::{FileSink, Sink};
use crate::error::{ChatlogError, Result};
use crate::formatters::Document;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Where to find the vault and which note to write.
#[derive(Debug, Clone, Default)]
pub struct VaultOptions {
    /// Full vault path; overrides `basedir` + `name`
    pub vault: Option<PathBuf>,
    /// Parent directory of vaults
    pub basedir: Option<PathBuf>,
    /// Vault directory name under `basedir`
    pub name: Option<String>,
    /// Only require the vault directory to exist
    pub no_verify: bool,
    /// Note path relative to the vault; overrides `note_folder` + `note_title`
    pub note: Option<PathBuf>,
    pub note_folder: Option<PathBuf>,
    pub note_title: Option<String>,
    pub tags: Vec<String>,
    pub overwrite: bool,
}

/// Default parent directory for vaults: `~/Documents`, else `~/My Documents`.
pub fn default_vault_basedir(home: &Path) -> Option<PathBuf> {
    ["Documents", "My Documents"]
        .iter()
        .map(|candidate| home.join(candidate))
        .find(|dir| dir.is_dir())
}

/// A validated vault and the note path inside it.
#[derive(Debug, Clone)]
pub struct ObsidianVault {
    vault_dir: PathBuf,
    note_path: PathBuf,
    tags: Vec<String>,
    overwrite: bool,
}

impl ObsidianVault {
    /// Resolve and validate the vault and note locations.
    pub fn open(options: &VaultOptions) -> Result<Self> {
        let basedir = options
            .basedir
            .clone()
            .or_else(|| dirs::home_dir().and_then(|home| default_vault_basedir(&home)));

        let vault_dir = match (&options.vault, &options.name, basedir) {
            (Some(vault), _, _) => vault.clone(),
            (None, Some(name), Some(basedir)) => basedir.join(name),
            _ => {
                return Err(ChatlogError::Vault(
                    "vault directory could not be determined; \
                     specify --vault or both --vault-name and --vault-basedir"
                        .to_string(),
                ))
            }
        };

        if !vault_dir.is_dir() {
            return Err(ChatlogError::Vault(format!(
                "vault directory does not exist: {}",
                vault_dir.display()
            )));
        }
        if !options.no_verify {
            verify_vault(&vault_dir)?;
        }

        let note_path = note_path(
            &vault_dir,
            options.note.as_deref(),
            options.note_folder.as_deref(),
            options.note_title.as_deref(),
        )
        .ok_or_else(|| {
            ChatlogError::Vault(
                "note file could not be determined; specify --note or --note-title".to_string(),
            )
        })?;

        match note_path.parent() {
            Some(dir) if dir.is_dir() => {}
            parent => {
                return Err(ChatlogError::Vault(format!(
                    "note directory does not exist: {}",
                    parent.unwrap_or(&vault_dir).display()
                )))
            }
        }

        tracing::debug!(
            "Obsidian vault at {}, note {}",
            vault_dir.display(),
            note_path.display()
        );

        Ok(Self {
            vault_dir,
            note_path,
            tags: options.tags.clone(),
            overwrite: options.overwrite,
        })
    }

    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    pub fn note_path(&self) -> &Path {
        &self.note_path
    }
}

impl Sink for ObsidianVault {
    fn write(&mut self, doc: &Document) -> Result<()> {
        let mut content = frontmatter(doc.meta.created, doc.meta.last_update, &self.tags)?;
        content.push_str(&doc.to_markdown()?);
        FileSink::new(&self.note_path, self.overwrite).write_content(&content)
    }
}

fn verify_vault(vault_dir: &Path) -> Result<()> {
    let obsidian_dir = vault_dir.join(".obsidian");
    if !obsidian_dir.is_dir() {
        return Err(ChatlogError::Vault(format!(
            "not a valid Obsidian vault; missing .obsidian directory: {}",
            vault_dir.display()
        )));
    }
    if !obsidian_dir.join("workspace.json").is_file() {
        return Err(ChatlogError::Vault(format!(
            "not a valid Obsidian vault; missing workspace.json file: {}",
            obsidian_dir.display()
        )));
    }
    Ok(())
}

/// Full note path, with `.md` appended when missing.
fn note_path(
    vault_dir: &Path,
    note: Option<&Path>,
    folder: Option<&Path>,
    title: Option<&str>,
) -> Option<PathBuf> {
    let path = match (note, title) {
        (Some(note), _) if !note.as_os_str().is_empty() => vault_dir.join(note),
        (_, Some(title)) if !title.trim().is_empty() => match folder {
            Some(folder) => vault_dir.join(folder).join(title),
            None => vault_dir.join(title),
        },
        _ => return None,
    };

    if path.extension().is_some_and(|ext| ext == "md") {
        Some(path)
    } else {
        let mut name = path.into_os_string();
        name.push(".md");
        Some(PathBuf::from(name))
    }
}

/// YAML frontmatter for a new note.
///
/// Missing timestamps default to now; `updated` defaults to `created`.
pub fn frontmatter(
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    tags: &[String],
) -> Result<String> {
    let created = created.unwrap_or_else(Utc::now);
    let updated = updated.unwrap_or(created);

    let mut out = String::from("---\n");
    writeln!(out, "created: {}", local_time(created))?;
    writeln!(out, "created-ts: {}", epoch_seconds(created))?;
    writeln!(out, "updated: {}", local_time(updated))?;
    writeln!(out, "updated-ts: {}", epoch_seconds(updated))?;
    writeln!(out, "document-type: copilot chat")?;
    if !tags.is_empty() {
        writeln!(out, "tags:")?;
        for tag in tags {
            writeln!(out, "  - \"{}\"", escape_yaml_string(tag))?;
        }
    }
    writeln!(out, "---\n")?;
    Ok(out)
}

/// Escape a value for a double-quoted YAML scalar.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}
