use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::remote::DEFAULT_TABLE;
use crate::sync::WriteMode;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Environment variables that override `[remote]`
pub const ENV_REMOTE_URL: &str = "STUDYLOG_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "STUDYLOG_REMOTE_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub write_mode: WriteMode,
    /// How long a one-shot command waits for remote writes before exiting
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,
}

/// Everything needed to reach the remote mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub realtime: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            export_dir: default_export_dir(),
            remote: RemoteConfig::default(),
            sync: SyncConfig::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
            realtime: default_realtime(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::default(),
            flush_timeout_secs: default_flush_timeout_secs(),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    Config::default_data_path_for_profile(utils::Profile::Prod, "cache.db")
}

fn default_export_dir() -> String {
    Config::default_data_path_for_profile(utils::Profile::Prod, "exports")
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_realtime() -> bool {
    true
}

fn default_flush_timeout_secs() -> u64 {
    10
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from the profile's config file, or create it with
    /// defaults if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let mut config = Self::load_from_path(&config_path)?;
            // Keep data inside the profile's directory (in case config was copied between profiles)
            if config.database_path == default_database_path() {
                config.database_path = Self::default_data_path_for_profile(profile, "cache.db");
            }
            if config.export_dir == default_export_dir() {
                config.export_dir = Self::default_data_path_for_profile(profile, "exports");
            }
            Ok(config)
        } else {
            let mut config = Config {
                database_path: Self::default_data_path_for_profile(profile, "cache.db"),
                export_dir: Self::default_data_path_for_profile(profile, "exports"),
                ..Config::default()
            };
            if let Err(e) = config.save_to_path(&config_path) {
                tracing::error!(path = %config_path.display(), "failed to save config file: {e}");
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load configuration from an explicit file; it must exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    fn default_data_path_for_profile(profile: utils::Profile, leaf: &str) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join(leaf).to_string_lossy().to_string()
        } else {
            // Fallback paths - platform-specific
            #[cfg(target_os = "macos")]
            {
                format!("~/Library/Application Support/{}/{}", profile.app_name(), leaf)
            }
            #[cfg(not(target_os = "macos"))]
            {
                format!("~/.local/share/{}/{}", profile.app_name(), leaf)
            }
        }
    }

    /// Apply `STUDYLOG_REMOTE_URL` / `STUDYLOG_REMOTE_KEY` if set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_REMOTE_URL).ok(),
            std::env::var(ENV_REMOTE_KEY).ok(),
        );
    }

    fn apply_overrides(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.remote.url = Some(url);
        }
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.remote.api_key = Some(key);
        }
    }

    /// Remote settings, if both URL and key are configured
    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        let url = self.remote.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let api_key = self.remote.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(RemoteSettings {
            url: url.to_string(),
            api_key: api_key.to_string(),
            table: self.remote.table.clone(),
            realtime: self.remote.realtime,
        })
    }

    /// Get the expanded cache path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn get_export_dir(&self) -> PathBuf {
        utils::expand_path(&self.export_dir)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.flush_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            database_path = "/tmp/studylog.db"

            [sync]
            write_mode = "serialized"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, "/tmp/studylog.db");
        assert_eq!(config.sync.write_mode, WriteMode::Serialized);
        assert_eq!(config.sync.flush_timeout_secs, 10);
        assert_eq!(config.remote.table, "calendar_days");
        assert!(config.remote_settings().is_none());
    }

    #[test]
    fn remote_needs_url_and_key() {
        let mut config = Config::default();
        config.apply_overrides(Some("https://db.example".into()), None);
        assert!(config.remote_settings().is_none());

        config.apply_overrides(None, Some("secret".into()));
        let remote = config.remote_settings().unwrap();
        assert_eq!(remote.url, "https://db.example");
        assert_eq!(remote.api_key, "secret");
        assert!(remote.realtime);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = Config::default();
        config.remote.url = Some("https://kept".into());
        config.apply_overrides(Some("  ".into()), None);
        assert_eq!(config.remote.url.as_deref(), Some("https://kept"));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.toml");

        let mut config = Config::default();
        config.remote.url = Some("https://db.example".into());
        config.config_version = None;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.remote.url.as_deref(), Some("https://db.example"));
        assert_eq!(loaded.config_version, Some(CURRENT_CONFIG_VERSION));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load_from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }
}
