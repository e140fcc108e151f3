//! Durable local settings with per-field defaulting and validation
//!
//! Settings live in local durable storage under a fixed key as a single JSON
//! object. Loading never fails: every field that is missing or outside its
//! domain falls back to its own default without discarding valid siblings.
//! Saving is all-or-nothing.

use crate::db::{self, Database};
use crate::error::{FeedError, FeedResult, FieldViolation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Storage key for the serialized settings object
pub const SETTINGS_KEY: &str = "tradingSettings";

pub const CONFIDENCE_THRESHOLD_RANGE: RangeInclusive<u32> = 70..=99;
pub const SIGNAL_FREQUENCY_RANGE: RangeInclusive<u32> = 1..=15;

/// Synchronous single-namespace key/value storage
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> FeedResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> FeedResult<()>;
}

/// Process-local storage (tests, ephemeral sessions)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> FeedResult<Option<String>> {
        let values = self.values.lock()
            .map_err(|_| FeedError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> FeedResult<()> {
        let mut values = self.values.lock()
            .map_err(|_| FeedError::Storage("memory storage lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by the `local_storage` table; each write is one upsert
#[derive(Clone)]
pub struct SqliteStorage {
    db: Database,
    namespace: String,
}

impl SqliteStorage {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        SqliteStorage {
            db,
            namespace: namespace.into(),
        }
    }
}

impl DurableStorage for SqliteStorage {
    fn get(&self, key: &str) -> FeedResult<Option<String>> {
        db::storage::get_value(self.db.get_connection(), &self.namespace, key)
            .map_err(|e| FeedError::Storage(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> FeedResult<()> {
        db::storage::set_value(self.db.get_connection(), &self.namespace, key, value)
            .map_err(|e| FeedError::Storage(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub telegram_enabled: bool,
    pub auto_mode_enabled: bool,
    pub confidence_threshold: u32,
    #[serde(rename = "signalFrequency")]
    pub signal_frequency_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_enabled: true,
            auto_mode_enabled: false,
            confidence_threshold: 88,
            signal_frequency_minutes: 5,
        }
    }
}

impl Settings {
    /// Check every field against its domain, reporting all violations at once
    pub fn validate(&self) -> FeedResult<()> {
        let mut violations = Vec::new();

        if !CONFIDENCE_THRESHOLD_RANGE.contains(&self.confidence_threshold) {
            violations.push(FieldViolation {
                field: "confidenceThreshold",
                value: self.confidence_threshold.to_string(),
                expected: range_label(&CONFIDENCE_THRESHOLD_RANGE),
            });
        }

        if !SIGNAL_FREQUENCY_RANGE.contains(&self.signal_frequency_minutes) {
            violations.push(FieldViolation {
                field: "signalFrequency",
                value: self.signal_frequency_minutes.to_string(),
                expected: range_label(&SIGNAL_FREQUENCY_RANGE),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(FeedError::Validation(violations))
        }
    }

    /// Decode a persisted blob, defaulting each unusable field on its own
    fn from_stored(raw: &str) -> Self {
        let defaults = Settings::default();

        let object = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                warn!("stored settings are not an object, using defaults");
                return defaults;
            }
            Err(e) => {
                warn!(error = %e, "stored settings are not valid JSON, using defaults");
                return defaults;
            }
        };

        let settings = Settings {
            telegram_enabled: bool_field(&object, "telegramEnabled")
                .unwrap_or(defaults.telegram_enabled),
            auto_mode_enabled: bool_field(&object, "autoModeEnabled")
                .unwrap_or(defaults.auto_mode_enabled),
            confidence_threshold: int_field(&object, "confidenceThreshold", &CONFIDENCE_THRESHOLD_RANGE)
                .unwrap_or(defaults.confidence_threshold),
            signal_frequency_minutes: int_field(&object, "signalFrequency", &SIGNAL_FREQUENCY_RANGE)
                .unwrap_or(defaults.signal_frequency_minutes),
        };

        debug!(?settings, "decoded stored settings");
        settings
    }
}

fn bool_field(object: &Map<String, Value>, key: &str) -> Option<bool> {
    object.get(key)?.as_bool()
}

fn int_field(object: &Map<String, Value>, key: &str, domain: &RangeInclusive<u32>) -> Option<u32> {
    let value = object.get(key)?.as_u64()?;
    u32::try_from(value).ok().filter(|v| domain.contains(v))
}

fn range_label(range: &RangeInclusive<u32>) -> String {
    format!("{}..={}", range.start(), range.end())
}

/// Returned after a confirmed save so the caller can show an acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAck {
    pub settings: Settings,
    pub saved_at: DateTime<Utc>,
}

impl SaveAck {
    pub fn message(&self) -> &'static str {
        "Settings saved successfully!"
    }
}

pub struct SettingsStore {
    storage: Arc<dyn DurableStorage>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        SettingsStore { storage }
    }

    /// Read persisted settings. Unreadable storage yields defaults.
    pub fn load(&self) -> Settings {
        match self.storage.get(SETTINGS_KEY) {
            Ok(Some(raw)) => Settings::from_stored(&raw),
            Ok(None) => {
                debug!("no stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to read settings, using defaults");
                Settings::default()
            }
        }
    }

    /// Validate then persist in a single write. Nothing is written when any
    /// field is out of domain.
    pub fn save(&self, settings: &Settings) -> FeedResult<SaveAck> {
        settings.validate()?;

        let blob = serde_json::to_string(settings)?;
        self.storage.set(SETTINGS_KEY, &blob)?;

        info!(
            telegram = settings.telegram_enabled,
            auto_mode = settings.auto_mode_enabled,
            threshold = settings.confidence_threshold,
            frequency = settings.signal_frequency_minutes,
            "💾 Settings saved"
        );

        Ok(SaveAck {
            settings: *settings,
            saved_at: Utc::now(),
        })
    }
}
