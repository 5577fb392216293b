//! Logger configuration and its persistence
//!
//! The configuration is stored as pretty-printed JSON by default, or TOML when the
//! path ends in `.toml`. Loading is fail-soft: a missing file is created with the
//! fallback configuration and a malformed one is ignored in favor of the fallback.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::Severity;

/// Configuration file used by the global logger
pub const DEFAULT_CONFIG_FILE: &str = "loggerconfig.json";

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Path of the active log file
    #[serde(default = "default_log_file_path", alias = "LogFilePath")]
    pub log_file_path: PathBuf,

    /// Messages below this level are dropped
    #[serde(default, rename = "currentLevel", alias = "CurrentLevel")]
    pub min_level: Severity,

    /// Echo every written line to stdout
    #[serde(default = "default_log_to_console", alias = "LogToConsole")]
    pub log_to_console: bool,

    /// Rotate the log file once it reaches this size (must be > 0)
    #[serde(default = "default_max_file_size", alias = "MaxFileSizeBytes")]
    pub max_file_size_bytes: u64,
}

fn default_log_file_path() -> PathBuf {
    PathBuf::from("app.log")
}

fn default_log_to_console() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    50_000
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_file_path: default_log_file_path(),
            min_level: Severity::Info,
            log_to_console: default_log_to_console(),
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

impl LoggerConfig {
    /// Check the configuration invariants
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_file_size_bytes > 0,
            "maxFileSizeBytes must be greater than zero"
        );
        anyhow::ensure!(
            !self.log_file_path.as_os_str().is_empty(),
            "logFilePath must not be empty"
        );
        Ok(())
    }
}

/// On-disk encoding of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension (TOML for `.toml`, JSON otherwise)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }

    fn serialize(self, config: &LoggerConfig) -> Result<String> {
        match self {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).context("Failed to serialize config")
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).context("Failed to serialize config")
            }
        }
    }

    fn deserialize(self, content: &str) -> Result<LoggerConfig> {
        match self {
            ConfigFormat::Json => {
                serde_json::from_str(content).context("Failed to parse config file")
            }
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse config file"),
        }
    }
}

/// Load the configuration at `path`, falling back to the defaults
///
/// A missing file is created with the default configuration.
pub fn load(path: &Path) -> LoggerConfig {
    load_or(path, &LoggerConfig::default())
}

/// Load the configuration at `path`, falling back to `fallback`
///
/// A missing file is created with `fallback`. A malformed or invalid file is left
/// untouched and `fallback` is returned. Never fails.
pub fn load_or(path: &Path, fallback: &LoggerConfig) -> LoggerConfig {
    match try_load(path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            if let Err(e) = save(path, fallback) {
                tracing::warn!("Could not create config file {}: {:#}", path.display(), e);
            }
            fallback.clone()
        }
        Err(e) => {
            tracing::warn!(
                "Ignoring config file {}, keeping previous settings: {:#}",
                path.display(),
                e
            );
            fallback.clone()
        }
    }
}

/// Strictly load the configuration at `path`
///
/// Returns `Ok(None)` when the file does not exist.
pub fn try_load(path: &Path) -> Result<Option<LoggerConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let config = ConfigFormat::from_path(path).deserialize(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Save the configuration to `path`
///
/// The content is written to a sibling temporary file first and then renamed over
/// the target, so readers see either the old or the new file.
pub fn save(path: &Path, config: &LoggerConfig) -> Result<()> {
    config.validate()?;
    let content = ConfigFormat::from_path(path).serialize(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context("Failed to create directory for config file")?;
    }

    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
