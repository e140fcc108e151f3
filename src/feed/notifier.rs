// Change notifier: out-of-band "something changed" cues for the record set

use crate::db;
use crate::error::{FeedError, FeedResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Payload-free notice that the remote dataset changed. Inserts, updates and
/// deletes all collapse to this one reload trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent;

/// Push channel announcing record-set mutations
pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self) -> FeedResult<broadcast::Receiver<ChangeEvent>>;
}

/// In-process fan-out of change events
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastNotifier { tx }
    }

    /// Emit a change cue, returning how many subscribers received it
    pub fn publish(&self) -> usize {
        // No subscribers is not an error: nobody is watching right now.
        self.tx.send(ChangeEvent).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn subscribe(&self) -> FeedResult<broadcast::Receiver<ChangeEvent>> {
        Ok(self.tx.subscribe())
    }
}

/// Publishes a change event whenever another connection commits to the
/// database file. Polling stops when the watcher is dropped.
pub struct DataVersionWatcher {
    handle: JoinHandle<()>,
}

impl DataVersionWatcher {
    pub fn spawn<P: AsRef<Path>>(
        path: P,
        interval: Duration,
        notifier: BroadcastNotifier,
    ) -> FeedResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| FeedError::Subscription(format!("{}: {}", path.display(), e)))?;
        let mut last_version = db::data_version(&conn)
            .map_err(|e| FeedError::Subscription(e.to_string()))?;

        debug!(path = %path.display(), ?interval, "watching database for external commits");

        let conn = Arc::new(Mutex::new(conn));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                match poll_data_version(Arc::clone(&conn)).await {
                    Ok(version) if version != last_version => {
                        last_version = version;
                        let delivered = notifier.publish();
                        debug!(version, delivered, "database changed");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "failed to read database data_version"),
                }
            }
        });

        Ok(DataVersionWatcher { handle })
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Query `data_version` on tokio's blocking pool
async fn poll_data_version(conn: Arc<Mutex<Connection>>) -> FeedResult<i64> {
    tokio::task::spawn_blocking(move || {
        let conn = db::lock_connection(&conn)?;
        db::data_version(&conn)
    })
    .await?
}

impl Drop for DataVersionWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
