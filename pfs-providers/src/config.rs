// SPDX-License-Identifier: AGPL-3.0-or-later
//! Startup configuration

use directories::ProjectDirs;
use pfs_core::{PfsError, PfsResult};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::platform::BackendKind;

const CONFIG_FILE: &str = "config.toml";

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_true() -> bool {
    true
}

/// Settings for the desktop backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Everything the backend exposes lives below this directory
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("/")
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
        }
    }
}

/// Settings for the sandboxed backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// App container; defaults to the platform data directory
    #[serde(default)]
    pub container: Option<PathBuf>,
    /// Shared external storage
    #[serde(default)]
    pub external: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub external_mounted: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            container: None,
            external: None,
            external_mounted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to build; `None` picks the platform default
    #[serde(default)]
    pub backend: Option<BackendKind>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: None,
            app_name: default_app_name(),
            local: LocalConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(content: &str) -> PfsResult<Self> {
        toml::from_str(content).map_err(|e| PfsError::Config(e.to_string()))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> PfsResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path).await {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| PfsError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(PfsError::Io(e)),
        }
    }

    /// `config.toml` in the per-user config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", env!("CARGO_PKG_NAME")).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn to_toml_string(&self) -> PfsResult<String> {
        toml::to_string_pretty(self).map_err(|e| PfsError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full() {
        let cfg = StoreConfig::from_toml_str(
            r#"
backend = "sandbox"
app_name = "notes"

[local]
root = "/srv"

[sandbox]
container = "/data/app"
external = "/sdcard"
external_mounted = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.backend, Some(BackendKind::Sandbox));
        assert_eq!(cfg.app_name, "notes");
        assert_eq!(cfg.local.root, PathBuf::from("/srv"));
        assert_eq!(cfg.sandbox.container, Some(PathBuf::from("/data/app")));
        assert!(!cfg.sandbox.external_mounted);
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let cfg = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, StoreConfig::default());
        assert!(cfg.sandbox.external_mounted);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = StoreConfig::from_toml_str("backend = \"ftp\"").unwrap_err();
        assert!(matches!(err, PfsError::Config(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut cfg = StoreConfig::default();
        cfg.backend = Some(BackendKind::Virtual);
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = StoreConfig::load(dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(cfg, StoreConfig::default());
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "backend = [").unwrap();
        let err = StoreConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, PfsError::Config(msg) if msg.contains(CONFIG_FILE)));
    }
}
