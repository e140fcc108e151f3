// Live signal feed: record store, change notifier, sync cache and the
// derived views computed from its snapshots

pub mod cache;
pub mod filter;
pub mod footprint;
pub mod notifier;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use cache::{LoadOutcome, ResubscribePolicy, Snapshot, Subscription, SyncCache, SyncStatus};
pub use filter::visible;
pub use footprint::{footprint, DatasetFootprint};
pub use notifier::{BroadcastNotifier, ChangeEvent, ChangeNotifier, DataVersionWatcher};
pub use stats::stats;
pub use store::{RecordStore, SqliteRecordStore};
