//! Configuration types and loading for daybook.
//!
//! Values are layered: built-in defaults, then the TOML config file, then
//! `DAYBOOK_*` environment variables (nested keys use `__`, e.g.
//! `DAYBOOK_EXPORT__INTERVAL_SECS`).

use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;
use crate::export::{DEFAULT_IDLE_GAP_SECS, ExportOptions};
use crate::{env_prefix, paths};

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding legacy `<kind>_<day_t0>.txt` logs.
    pub logs_dir: PathBuf,

    /// Path to the event store. Defaults to `daybook.db` inside `logs_dir`.
    pub database: Option<PathBuf>,

    /// Directory the per-day JSON payloads and the manifest are written to.
    pub render_dir: PathBuf,

    /// Silence in seconds after which an idle marker is inferred; 0 disables.
    pub idle_gap_secs: i64,

    /// Periodic export settings.
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = paths::data_dir();
        Self {
            logs_dir: data_dir.join("logs"),
            database: None,
            render_dir: data_dir.join("render"),
            idle_gap_secs: DEFAULT_IDLE_GAP_SECS,
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load configuration from a specific file (if present) and the
    /// environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            builder = builder.add_source(File::from_str(&content, FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(&env_prefix())
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.expand_paths();
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        paths::config_dir().join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default().save_to_path(path)?;
        }
        Self::load_from_path(path)
    }

    /// Expand a path, replacing ~ with home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    fn expand_paths(&mut self) {
        self.logs_dir = Self::expand_path(&self.logs_dir.to_string_lossy());
        self.render_dir = Self::expand_path(&self.render_dir.to_string_lossy());
        self.database = self
            .database
            .as_ref()
            .map(|p| Self::expand_path(&p.to_string_lossy()));
    }

    /// Resolved path of the event store.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.logs_dir.join("daybook.db"))
    }

    /// Export pipeline options derived from this configuration.
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            idle_gap_secs: self.idle_gap_secs,
        }
    }
}

/// Periodic export configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Seconds between export passes of `daybook run`.
    pub interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
