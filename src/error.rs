//! Unified error handling for the signal feed
//!
//! Every fallible operation in the crate returns [`FeedResult`]. The variants
//! are grouped so the presentation layer can decide between a transient status
//! indicator (fetch, subscription) and a hard failure shown to the user
//! (validation, delete).

use std::fmt;
use std::io;

/// A single settings field that failed domain validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub value: String,
    pub expected: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} (expected {})", self.field, self.value, self.expected)
    }
}

/// Main error type for the signal feed
#[derive(Debug)]
pub enum FeedError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // Database errors
    DatabaseConnection(String),
    DatabaseQuery(String),
    DatabaseMigration(String),

    // Record store errors
    Fetch(String),
    MalformedRecord(String, String), // (record id, reason)
    Delete(String),

    // Change notifier errors
    Subscription(String),

    // Settings errors
    Validation(Vec<FieldViolation>),
    Storage(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),

    // General errors
    Internal(String),
}

impl FeedError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            FeedError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: signal-feed init\n\
                    2. Edit feed.toml if the defaults do not fit\n\
                    3. Try again",
                    path
                )
            }
            FeedError::Fetch(_) | FeedError::MalformedRecord(_, _) => {
                format!(
                    "{}\n\n\
                    💡 Showing the last loaded signals. The feed refreshes \
                    on the next change notification or manual refresh.",
                    self
                )
            }
            FeedError::Delete(_) => {
                format!(
                    "{}\n\n\
                    💡 No signals were removed from the local view. \
                    Check the database and try again.",
                    self
                )
            }
            FeedError::Subscription(_) => {
                format!(
                    "{}\n\n\
                    💡 Live updates are paused. Use refresh until the \
                    connection is restored.",
                    self
                )
            }
            FeedError::Validation(violations) => {
                let lines: Vec<String> = violations
                    .iter()
                    .map(|v| format!("  - {}", v))
                    .collect();
                format!("Settings were not saved:\n{}", lines.join("\n"))
            }
            _ => self.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::Fetch(_)
                | FeedError::Subscription(_)
                | FeedError::DatabaseConnection(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            FeedError::ConfigNotFound(_)
            | FeedError::ConfigParse(_)
            | FeedError::ConfigValidation(_) => "config",

            FeedError::DatabaseConnection(_)
            | FeedError::DatabaseQuery(_)
            | FeedError::DatabaseMigration(_) => "database",

            FeedError::Fetch(_) | FeedError::MalformedRecord(_, _) => "fetch",
            FeedError::Delete(_) => "delete",
            FeedError::Subscription(_) => "subscription",

            FeedError::Validation(_) => "validation",
            FeedError::Storage(_) => "storage",

            FeedError::FileNotFound(_)
            | FeedError::FileRead(_)
            | FeedError::FileWrite(_) => "io",

            FeedError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            FeedError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            FeedError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            FeedError::DatabaseConnection(msg) => {
                write!(f, "Database connection error: {}", msg)
            }
            FeedError::DatabaseQuery(msg) => {
                write!(f, "Database query error: {}", msg)
            }
            FeedError::DatabaseMigration(msg) => {
                write!(f, "Database migration error: {}", msg)
            }

            FeedError::Fetch(msg) => {
                write!(f, "Failed to fetch signals: {}", msg)
            }
            FeedError::MalformedRecord(id, reason) => {
                write!(f, "Malformed signal record '{}': {}", id, reason)
            }
            FeedError::Delete(msg) => {
                write!(f, "Failed to delete signals: {}", msg)
            }

            FeedError::Subscription(msg) => {
                write!(f, "Change subscription error: {}", msg)
            }

            FeedError::Validation(violations) => {
                let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "Validation failed: {}", parts.join("; "))
            }
            FeedError::Storage(msg) => {
                write!(f, "Local storage error: {}", msg)
            }

            FeedError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            FeedError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            FeedError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            FeedError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for FeedError {}

// Conversion implementations for common error types

impl From<io::Error> for FeedError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FeedError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => FeedError::FileRead(err.to_string()),
            _ => FeedError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<rusqlite::Error> for FeedError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let msg = msg.unwrap_or_else(|| code.to_string());
                match code.code {
                    rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked => FeedError::DatabaseConnection(msg),
                    _ => FeedError::DatabaseQuery(msg),
                }
            }
            _ => FeedError::DatabaseQuery(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Internal(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for FeedError {
    fn from(err: toml::de::Error) -> Self {
        FeedError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<tokio::task::JoinError> for FeedError {
    fn from(err: tokio::task::JoinError) -> Self {
        FeedError::Internal(format!("Background task failed: {}", err))
    }
}

impl From<crate::config::ConfigError> for FeedError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileNotFound(path) => FeedError::ConfigNotFound(path),
            ConfigError::FileRead(msg) => FeedError::FileRead(msg),
            ConfigError::FileWrite(msg) => FeedError::FileWrite(msg),
            ConfigError::Parse(msg) | ConfigError::Serialize(msg) => FeedError::ConfigParse(msg),
            ConfigError::Validation(msg) => FeedError::ConfigValidation(msg),
        }
    }
}

impl From<String> for FeedError {
    fn from(msg: String) -> Self {
        FeedError::Internal(msg)
    }
}

impl From<&str> for FeedError {
    fn from(msg: &str) -> Self {
        FeedError::Internal(msg.to_string())
    }
}

/// Result type alias using FeedError
pub type FeedResult<T> = Result<T, FeedError>;
