//! Config module - Manages copilot-chatlog configuration (config.toml).
//!
//! Configuration file contains:
//! - Storage location overrides
//! - Default sort keys and sanitization
//! - Obsidian vault defaults
//!
//! Command-line flags and environment variables take precedence over the file.

use crate::locator::Flavor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Obsidian vault defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VaultConfig {
    /// Full path to the vault
    pub path: Option<PathBuf>,
    /// Parent directory of vaults
    pub basedir: Option<PathBuf>,
    /// Vault directory name under `basedir`
    pub name: Option<String>,
    /// Note folder relative to the vault root
    pub note_folder: Option<PathBuf>,
    /// Tags added to every exported note
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Main copilot-chatlog configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Explicit `workspaceStorage` directory
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// VS Code build to read from when no storage path is given
    #[serde(default)]
    pub flavor: Flavor,

    /// Sanitize rendered text (default: true)
    #[serde(default = "default_sanitize")]
    pub sanitize: bool,

    /// Default workspace sort spec, e.g. "-updated"
    #[serde(default)]
    pub workspace_sort: Option<String>,

    /// Default session sort spec
    #[serde(default)]
    pub session_sort: Option<String>,

    #[serde(default)]
    pub vault: VaultConfig,
}

fn default_sanitize() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: None,
            flavor: Flavor::default(),
            sanitize: default_sanitize(),
            workspace_sort: None,
            session_sort: None,
            vault: VaultConfig::default(),
        }
    }
}

/// Get default config directory (~/.config/copilot-chatlog/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("copilot-chatlog"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl Config {
    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from default path, or defaults when there is no file.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path (must exist) or the default location.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create config directory: {}", parent.display()))?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        Ok(())
    }
}
