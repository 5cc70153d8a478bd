//! Storage Locator - Resolves the VS Code `workspaceStorage` root to scan.
//!
//! The platform default is computed by a pure function so every platform can
//! be exercised from a single test run.

use crate::error::{ChatlogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Operating system family, as far as VS Code's storage layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// VS Code build whose storage should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    #[default]
    Stable,
    Insiders,
}

impl Flavor {
    /// Application directory name under the per-user config directory.
    pub fn app_dir(&self) -> &'static str {
        match self {
            Flavor::Stable => "Code",
            Flavor::Insiders => "Code - Insiders",
        }
    }
}

impl std::str::FromStr for Flavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" | "code" => Ok(Flavor::Stable),
            "insiders" | "code-insiders" => Ok(Flavor::Insiders),
            other => Err(format!("unknown VS Code flavor: {}", other)),
        }
    }
}

/// Default `workspaceStorage` directory for a platform, relative to `home`.
///
/// - Windows: `%USERPROFILE%\AppData\Roaming\Code\User\workspaceStorage`
/// - macOS: `~/Library/Application Support/Code/User/workspaceStorage`
/// - Linux: `~/.config/Code/User/workspaceStorage`
///
/// Returns `None` for platforms without a known layout.
pub fn default_storage_dir(platform: Platform, flavor: Flavor, home: &Path) -> Option<PathBuf> {
    let config_dir = match platform {
        Platform::Windows => home.join("AppData").join("Roaming"),
        Platform::MacOs => home.join("Library").join("Application Support"),
        Platform::Linux => home.join(".config"),
        Platform::Other => return None,
    };
    Some(
        config_dir
            .join(flavor.app_dir())
            .join("User")
            .join("workspaceStorage"),
    )
}

/// Resolve the scan root from an explicit override or the platform default.
///
/// Fails with [`ChatlogError::StorageNotFound`] when the resolved directory
/// does not exist.
pub fn resolve_storage_root(explicit: Option<&Path>, flavor: Flavor) -> Result<PathBuf> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => dirs::home_dir()
            .and_then(|home| default_storage_dir(Platform::current(), flavor, &home))
            .ok_or(ChatlogError::NoDefaultStorage)?,
    };

    if !path.is_dir() {
        return Err(ChatlogError::StorageNotFound { path });
    }

    tracing::debug!("Using workspace storage at {}", path.display());
    Ok(path)
}
