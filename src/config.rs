// Configuration management for the signal feed

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "SIGNAL_FEED_DB";
pub const LOG_LEVEL_ENV: &str = "SIGNAL_FEED_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/signals.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub channel_capacity: usize,   // Buffered change events per subscriber
    pub poll_interval_ms: u64,     // How often the database watcher checks for commits
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub resubscribe_initial_backoff_ms: u64,
    pub resubscribe_max_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resubscribe_initial_backoff_ms: 250,
            resubscribe_max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub namespace: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            namespace: "signal-feed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::FileWrite(e.to_string()))?;
            }
        }

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!(path = %path.as_ref().display(), "📁 Created default config file");
            Ok(config)
        }
    }

    /// Apply `SIGNAL_FEED_DB` / `SIGNAL_FEED_LOG` on top of file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.notifier.poll_interval_ms)
    }

    pub fn resubscribe_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.sync.resubscribe_initial_backoff_ms),
            Duration::from_millis(self.sync.resubscribe_max_backoff_ms),
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Validation("database.path must not be empty".to_string()));
        }

        if self.notifier.channel_capacity == 0 {
            return Err(ConfigError::Validation("notifier.channel_capacity must be greater than 0".to_string()));
        }

        if self.notifier.poll_interval_ms == 0 {
            return Err(ConfigError::Validation("notifier.poll_interval_ms must be greater than 0".to_string()));
        }

        if self.sync.resubscribe_initial_backoff_ms == 0 {
            return Err(ConfigError::Validation("sync.resubscribe_initial_backoff_ms must be greater than 0".to_string()));
        }

        if self.sync.resubscribe_max_backoff_ms < self.sync.resubscribe_initial_backoff_ms {
            return Err(ConfigError::Validation(
                "sync.resubscribe_max_backoff_ms must not be below the initial backoff".to_string(),
            ));
        }

        if self.settings.namespace.trim().is_empty() {
            return Err(ConfigError::Validation("settings.namespace must not be empty".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
