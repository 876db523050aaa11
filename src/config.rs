use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core;
use crate::error::Result;

const APP_DIR: &str = "deoxit";
const CONFIG_FILE: &str = "config.toml";

/// User settings, read from `config.toml` in the platform config directory.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Root to scan when none has been picked yet.
    pub root: Option<PathBuf>,
    pub quote_delay_ms: u64,
    /// Program invoked as `<clean_program> clean` inside a project.
    pub clean_program: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: None,
            quote_delay_ms: 1000,
            clean_program: "cargo".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let settings = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(raw)?;
        settings.root = settings.root.map(|root| core::expand_path(&root));
        Ok(settings)
    }

    pub fn quote_delay(&self) -> Duration {
        Duration::from_millis(self.quote_delay_ms)
    }

    /// The configured root, or the home directory.
    pub fn initial_root(&self) -> Option<PathBuf> {
        self.root.clone().or_else(core::home_dir)
    }
}
