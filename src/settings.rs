//! Flat key/value settings
//!
//! A process-wide string map persisted as `key=value` lines. Unlike the logger,
//! lookups of absent keys are errors for the caller.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{OnceLock, PoisonError, RwLock};

use anyhow::{Context, Result};

/// Settings lookup and update errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("setting '{0}' not found")]
    NotFound(String),

    #[error("invalid setting key '{0}'")]
    InvalidKey(String),

    #[error("invalid value for setting '{0}'")]
    InvalidValue(String),
}

/// Thread-safe settings map
#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<BTreeMap<String, String>>,
}

impl Settings {
    /// Create an empty settings map
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide settings instance
    pub fn global() -> &'static Settings {
        static SETTINGS: OnceLock<Settings> = OnceLock::new();
        SETTINGS.get_or_init(Settings::new)
    }

    /// Get the value stored under `key`
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| SettingsError::NotFound(key.to_string()))
    }

    /// Insert or replace the value stored under `key`
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if key.is_empty() || key.contains(['=', '\n', '\r']) {
            return Err(SettingsError::InvalidKey(key.to_string()));
        }
        if value.contains(['\n', '\r']) {
            return Err(SettingsError::InvalidValue(key.to_string()));
        }

        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Number of stored settings
    pub fn len(&self) -> usize {
        self.values
            .read()
            .map(|v| v.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    /// Check if no settings are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all settings to `path` as `key=value` lines, sorted by key
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content: String = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, value))
            .collect();

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file {}", path.display()))
    }

    /// Merge settings from the `key=value` file at `path`
    ///
    /// A missing file loads nothing. Lines without `=` or with an empty key are
    /// skipped. Returns the number of settings loaded.
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings file {}", path.display()));
            }
        };

        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = 0;
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), value.to_string());
            loaded += 1;
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_missing_key() {
        let settings = Settings::new();
        assert_eq!(
            settings.get("theme"),
            Err(SettingsError::NotFound("theme".to_string()))
        );
    }

    #[test]
    fn test_set_and_get() {
        let settings = Settings::new();
        settings.set("theme", "dark").unwrap();
        settings.set("theme", "light").unwrap();

        assert_eq!(settings.get("theme").unwrap(), "light");
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_set_rejects_invalid_keys() {
        let settings = Settings::new();
        assert!(matches!(
            settings.set("", "x"),
            Err(SettingsError::InvalidKey(_))
        ));
        assert!(matches!(
            settings.set("a=b", "x"),
            Err(SettingsError::InvalidKey(_))
        ));
        assert!(matches!(
            settings.set("key", "two\nlines"),
            Err(SettingsError::InvalidValue(_))
        ));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.txt");

        let settings = Settings::new();
        settings.set("zeta", "last").unwrap();
        settings.set("alpha", "a=b").unwrap();
        settings.save_to_file(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "alpha=a=b\nzeta=last\n"
        );

        let loaded = Settings::new();
        assert_eq!(loaded.load_from_file(&path).unwrap(), 2);
        assert_eq!(loaded.get("alpha").unwrap(), "a=b");
        assert_eq!(loaded.get("zeta").unwrap(), "last");
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new();
        settings.set("kept", "yes").unwrap();

        let loaded = settings
            .load_from_file(&temp_dir.path().join("missing.txt"))
            .unwrap();
        assert_eq!(loaded, 0);
        assert_eq!(settings.get("kept").unwrap(), "yes");
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.txt");
        std::fs::write(&path, "valid=1\nno separator\n=empty key\n\nother=\n").unwrap();

        let settings = Settings::new();
        assert_eq!(settings.load_from_file(&path).unwrap(), 2);
        assert_eq!(settings.get("valid").unwrap(), "1");
        assert_eq!(settings.get("other").unwrap(), "");
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(Settings::global(), Settings::global()));
    }
}
