// Record store: the remote, multi-writer signal dataset

use crate::db::Database;
use crate::error::{FeedError, FeedResult};
use crate::feed::notifier::BroadcastNotifier;
use crate::types::{NewSignal, Signal};
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Persistent dataset of signal records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, ordered by `created_at` descending when the store can
    /// guarantee it. Callers re-sort regardless.
    async fn select_all(&self) -> FeedResult<Vec<Signal>>;

    /// Remove every record, returning the number deleted
    async fn delete_all(&self) -> FeedResult<u64>;
}

/// SQLite-backed record store. Blocking work runs on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Database,
    notifier: Option<BroadcastNotifier>,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        SqliteRecordStore { db, notifier: None }
    }

    /// Announce this store's own writes on `notifier`
    pub fn with_notifier(mut self, notifier: BroadcastNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Store a new signal, assigning its identifier
    pub async fn insert(&self, draft: NewSignal) -> FeedResult<Signal> {
        let mut signal = draft.into_signal(Uuid::new_v4(), Utc::now());
        // Stored with microsecond precision
        signal.created_at = signal.created_at.trunc_subsecs(6);
        let conn = self.db.get_connection();
        let stored = signal.clone();
        tokio::task::spawn_blocking(move || stored.insert(conn)).await??;

        debug!(id = %signal.id, pair = %signal.pair, action = %signal.action, "stored signal");
        self.announce();
        Ok(signal)
    }

    pub async fn count(&self) -> FeedResult<usize> {
        let conn = self.db.get_connection();
        tokio::task::spawn_blocking(move || Signal::count(conn)).await?
    }

    fn announce(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.publish();
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn select_all(&self) -> FeedResult<Vec<Signal>> {
        let conn = self.db.get_connection();
        let result = tokio::task::spawn_blocking(move || Signal::list_all(conn))
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;

        match result {
            Ok(signals) => Ok(signals),
            Err(err @ FeedError::MalformedRecord(_, _)) => Err(err),
            Err(err) => Err(FeedError::Fetch(err.to_string())),
        }
    }

    async fn delete_all(&self) -> FeedResult<u64> {
        let conn = self.db.get_connection();
        let deleted = tokio::task::spawn_blocking(move || Signal::delete_all(conn))
            .await
            .map_err(|e| FeedError::Delete(e.to_string()))?
            .map_err(|e| FeedError::Delete(e.to_string()))?;

        info!(deleted, "🗑️  Deleted all signals from record store");
        self.announce();
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::notifier::ChangeNotifier;
    use crate::types::{Action, Confidence, Session};

    fn store() -> SqliteRecordStore {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        SqliteRecordStore::new(db)
    }

    #[tokio::test]
    async fn test_insert_and_select() {
        let store = store();
        let draft = NewSignal::new("EUR/USD", Action::Sell, Confidence::new(77).unwrap(), Session::NewYork);

        let stored = store.insert(draft).await.unwrap();
        let all = store.select_all().await.unwrap();

        assert_eq!(all, vec![stored]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_writes_are_announced() {
        let notifier = BroadcastNotifier::new(8);
        let mut events = notifier.subscribe().unwrap();
        let store = store().with_notifier(notifier);

        store
            .insert(NewSignal::new("USD/JPY", Action::Buy, Confidence::new(91).unwrap(), Session::Asian))
            .await
            .unwrap();
        store.delete_all().await.unwrap();

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_delete_without_schema_is_delete_error() {
        let store = SqliteRecordStore::new(Database::new_in_memory().unwrap());
        let err = store.delete_all().await.unwrap_err();
        assert!(matches!(err, FeedError::Delete(_)));
    }
}
