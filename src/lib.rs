// Signal Feed Library
//
// Keeps a local view of a shared trading-signal record set in sync with the
// database, filters it, summarizes it, and stores dashboard settings.

pub mod types;
pub mod config;
pub mod db;          // SQLite record store and local storage tables
pub mod error;       // Unified error handling
pub mod feed;
pub mod settings;
pub mod dashboard;

// Re-export domain types
pub use types::{
    Action, ActionFilter, Confidence, FilterCriteria, NewSignal, Session, SessionFilter, Signal,
    Stats,
};

// Re-export error types
pub use error::{FeedError, FeedResult, FieldViolation};

// Re-export configuration
pub use config::{Config, ConfigError};

// Re-export database types
pub use db::Database;

// Re-export feed components
pub use feed::{
    footprint, stats, visible, BroadcastNotifier, ChangeEvent, ChangeNotifier, DataVersionWatcher,
    DatasetFootprint, LoadOutcome, RecordStore, ResubscribePolicy, Snapshot, SqliteRecordStore,
    Subscription, SyncCache, SyncStatus,
};

// Re-export settings
pub use settings::{DurableStorage, MemoryStorage, SaveAck, Settings, SettingsStore, SqliteStorage};

pub use dashboard::{ClearOutcome, Confirmation, Dashboard, DashboardView};
