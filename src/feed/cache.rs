// Sync cache: local mirror of the remote signal set
//
// Every mutation is a whole-snapshot replacement. Loads are tagged with a
// monotonically increasing token; a load only applies when its token is newer
// than the one that produced the current snapshot, so a slow early request
// can never clobber a fresher one.

use crate::error::{FeedError, FeedResult};
use crate::feed::notifier::{ChangeEvent, ChangeNotifier};
use crate::feed::store::RecordStore;
use crate::types::Signal;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Immutable, shareable view of the signal sequence (most recent first)
pub type Snapshot = Arc<[Signal]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fetched set replaced the local sequence
    Applied { generation: u64, count: usize },
    /// A newer load or clear already landed; the result was discarded
    Superseded { token: u64, current: u64 },
}

/// Status flags for a non-blocking indicator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub loading: bool,
    pub live: bool,
    pub last_error: Option<String>,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResubscribePolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ResubscribePolicy {
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

struct CacheState {
    signals: Snapshot,
    generation: u64,
    /// Token of the newest load that failed; its error stays visible until a
    /// newer load succeeds
    failed_token: u64,
    last_error: Option<String>,
    last_loaded_at: Option<DateTime<Utc>>,
}

/// Single source of truth for the signal sequence
pub struct SyncCache {
    store: Arc<dyn RecordStore>,
    state: RwLock<CacheState>,
    next_token: AtomicU64,
    in_flight: AtomicUsize,
    live: AtomicBool,
    updates: watch::Sender<u64>,
}

impl SyncCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (updates, _) = watch::channel(0);
        SyncCache {
            store,
            state: RwLock::new(CacheState {
                signals: Vec::new().into(),
                generation: 0,
                failed_token: 0,
                last_error: None,
                last_loaded_at: None,
            }),
            next_token: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            live: AtomicBool::new(false),
            updates,
        }
    }

    /// Current sequence. Later reloads never mutate a snapshot already handed out.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.read_state().signals)
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.read_state();
        SyncStatus {
            loading: self.in_flight.load(Ordering::SeqCst) > 0,
            live: self.live.load(Ordering::SeqCst),
            last_error: state.last_error.clone(),
            last_loaded_at: state.last_loaded_at,
            generation: state.generation,
        }
    }

    /// Receiver that is marked changed every time the local sequence is replaced
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Fetch the full record set and replace the local sequence.
    ///
    /// On failure the previous sequence is kept and the error is recorded in
    /// [`SyncStatus::last_error`]. Dropping the returned future abandons the
    /// fetch without touching local state.
    pub async fn load(&self) -> FeedResult<LoadOutcome> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight::enter(&self.in_flight);
        debug!(token, "loading signals");

        let fetched = self.store.select_all().await;

        let mut state = self.write_state();
        if token <= state.generation {
            debug!(token, current = state.generation, "discarding stale load");
            return Ok(LoadOutcome::Superseded {
                token,
                current: state.generation,
            });
        }

        match fetched {
            Ok(mut signals) => {
                sort_newest_first(&mut signals);
                let count = signals.len();

                state.signals = signals.into();
                state.generation = token;
                if token > state.failed_token {
                    state.last_error = None;
                }
                state.last_loaded_at = Some(Utc::now());
                drop(state);

                self.updates.send_replace(token);
                info!(count, generation = token, "📥 Signals loaded");
                Ok(LoadOutcome::Applied {
                    generation: token,
                    count,
                })
            }
            Err(err) => {
                let err = match err {
                    err @ (FeedError::Fetch(_) | FeedError::MalformedRecord(_, _)) => err,
                    other => FeedError::Fetch(other.to_string()),
                };
                warn!(token, error = %err, "failed to load signals, keeping previous snapshot");
                if token > state.failed_token {
                    state.failed_token = token;
                    state.last_error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Delete every record in the store, then empty the local sequence.
    ///
    /// The local sequence is only cleared once the store confirms; on failure
    /// it is left exactly as it was. Loads issued before the confirmation,
    /// including ones started while the delete was running, are superseded.
    pub async fn clear_all(&self) -> FeedResult<u64> {
        let deleted = match self.store.delete_all().await {
            Ok(deleted) => deleted,
            Err(err) => {
                let err = match err {
                    err @ FeedError::Delete(_) => err,
                    other => FeedError::Delete(other.to_string()),
                };
                warn!(error = %err, "clear all failed, local signals retained");
                return Err(err);
            }
        };

        // Taken after the store confirmed, so it outranks every earlier load
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = {
            let mut state = self.write_state();
            state.signals = Vec::new().into();
            state.generation = state.generation.max(token);
            state.failed_token = state.failed_token.max(token);
            state.last_error = None;
            state.generation
        };

        self.updates.send_replace(generation);
        info!(deleted, "🧹 Local signal cache cleared");
        Ok(deleted)
    }

    /// Reload on every notifier event until the returned guard is released.
    ///
    /// Call this before the initial [`load`](Self::load): the notifier does
    /// not replay events announced before the channel existed.
    ///
    /// A notifier that cannot be reached does not fail the call: live updates
    /// stay paused (see [`SyncStatus::live`]) and the subscription keeps
    /// retrying with backoff.
    pub fn subscribe(
        self: &Arc<Self>,
        notifier: Arc<dyn ChangeNotifier>,
        policy: ResubscribePolicy,
    ) -> Subscription {
        let receiver = match notifier.subscribe() {
            Ok(rx) => {
                self.live.store(true, Ordering::SeqCst);
                debug!("change subscription established");
                Some(rx)
            }
            Err(err) => {
                self.live.store(false, Ordering::SeqCst);
                warn!(error = %err, "change subscription failed, live updates paused");
                None
            }
        };

        let handle = tokio::spawn(run_subscription(Arc::clone(self), notifier, policy, receiver));

        Subscription {
            handle: Some(handle),
            cache: Arc::clone(self),
        }
    }

    async fn reload(&self) {
        if let Err(err) = self.load().await {
            debug!(error = %err, "reload after change notification failed");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        // State is only ever replaced wholesale, so a poisoned lock still holds
        // a consistent snapshot.
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sort by `created_at` descending; ties broken by id for a deterministic order
pub fn sort_newest_first(signals: &mut [Signal]) {
    signals.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Live change subscription. Released by [`Subscription::unsubscribe`] or on drop;
/// either way the notifier channel is closed and any in-flight reload is abandoned.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
    cache: Arc<SyncCache>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Release the subscription and wait until its channel is dropped
    pub async fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.cache.live.store(false, Ordering::SeqCst);
        debug!("change subscription released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.cache.live.store(false, Ordering::SeqCst);
            debug!("change subscription dropped");
        }
    }
}

async fn run_subscription(
    cache: Arc<SyncCache>,
    notifier: Arc<dyn ChangeNotifier>,
    policy: ResubscribePolicy,
    mut receiver: Option<broadcast::Receiver<ChangeEvent>>,
) {
    let mut backoff = policy.initial_backoff;

    loop {
        let mut rx = match receiver.take() {
            Some(rx) => rx,
            None => {
                tokio::time::sleep(backoff).await;
                match notifier.subscribe() {
                    Ok(rx) => {
                        info!("🔌 Change subscription re-established");
                        cache.live.store(true, Ordering::SeqCst);
                        backoff = policy.initial_backoff;
                        // Changes during the outage were never announced
                        cache.reload().await;
                        rx
                    }
                    Err(err) => {
                        warn!(error = %err, retry_in = ?backoff, "change subscription retry failed");
                        backoff = policy.next(backoff);
                        continue;
                    }
                }
            }
        };

        loop {
            match rx.recv().await {
                Ok(ChangeEvent) | Err(RecvError::Lagged(_)) => {
                    let coalesced = drain_pending(&mut rx);
                    debug!(coalesced, "change notification received");
                    cache.reload().await;
                }
                Err(RecvError::Closed) => {
                    warn!("change notifier closed, live updates paused");
                    cache.live.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
}

/// Swallow events already queued so a burst triggers a single reload.
/// Events arriving after this point are left for the next reload.
fn drain_pending(rx: &mut broadcast::Receiver<ChangeEvent>) -> usize {
    let mut drained = 0;
    loop {
        match rx.try_recv() {
            Ok(ChangeEvent) | Err(TryRecvError::Lagged(_)) => drained += 1,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return drained,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Confidence, NewSignal, Session};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Store double returning a fixed set, optionally failing
    struct FixedStore {
        signals: Mutex<Vec<Signal>>,
        fail_fetch: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl FixedStore {
        fn new(signals: Vec<Signal>) -> Arc<Self> {
            Arc::new(FixedStore {
                signals: Mutex::new(signals),
                fail_fetch: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl RecordStore for FixedStore {
        async fn select_all(&self) -> FeedResult<Vec<Signal>> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(FeedError::Fetch("store unreachable".to_string()));
            }
            Ok(self.signals.lock().unwrap().clone())
        }

        async fn delete_all(&self) -> FeedResult<u64> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(FeedError::DatabaseQuery("disk I/O error".to_string()));
            }
            let mut signals = self.signals.lock().unwrap();
            let deleted = signals.len() as u64;
            signals.clear();
            Ok(deleted)
        }
    }

    fn signal_at(pair: &str, hour: u32) -> Signal {
        NewSignal::new(pair, Action::Buy, Confidence::new(80).unwrap(), Session::London)
            .created_at(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap())
            .into_signal(Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_load_resorts_newest_first() {
        // Store hands back oldest first
        let store = FixedStore::new(vec![
            signal_at("AUD/USD", 1),
            signal_at("EUR/USD", 9),
            signal_at("GBP/USD", 5),
        ]);
        let cache = SyncCache::new(store);

        let outcome = cache.load().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied { generation: 1, count: 3 });

        let pairs: Vec<_> = cache.snapshot().iter().map(|s| s.pair.clone()).collect();
        assert_eq!(pairs, vec!["EUR/USD", "GBP/USD", "AUD/USD"]);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_snapshot() {
        let store = FixedStore::new(vec![signal_at("EUR/USD", 1)]);
        let cache = SyncCache::new(store.clone());
        cache.load().await.unwrap();

        store.fail_fetch.store(true, Ordering::SeqCst);
        let err = cache.load().await.unwrap_err();

        assert!(matches!(err, FeedError::Fetch(_)));
        assert_eq!(cache.snapshot().len(), 1);
        let status = cache.status();
        assert!(status.last_error.is_some());
        assert!(!status.loading);
        assert_eq!(status.generation, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_not_mutated_by_reload() {
        let store = FixedStore::new(vec![signal_at("EUR/USD", 1)]);
        let cache = SyncCache::new(store.clone());
        cache.load().await.unwrap();
        let before = cache.snapshot();

        store.signals.lock().unwrap().push(signal_at("GBP/USD", 2));
        cache.load().await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(cache.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_failure_is_delete_error_and_keeps_signals() {
        let store = FixedStore::new(vec![signal_at("EUR/USD", 1), signal_at("GBP/USD", 2)]);
        let cache = SyncCache::new(store.clone());
        cache.load().await.unwrap();

        store.fail_delete.store(true, Ordering::SeqCst);
        let err = cache.clear_all().await.unwrap_err();

        assert!(matches!(err, FeedError::Delete(_)));
        assert_eq!(cache.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_bumps_updates() {
        let store = FixedStore::new(vec![signal_at("EUR/USD", 1)]);
        let cache = SyncCache::new(store);
        cache.load().await.unwrap();
        let mut updates = cache.updates();
        updates.borrow_and_update();

        assert_eq!(cache.clear_all().await.unwrap(), 1);
        assert!(updates.has_changed().unwrap());
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = ResubscribePolicy::new(Duration::from_millis(100), Duration::from_millis(300));
        assert_eq!(policy.next(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(policy.next(Duration::from_millis(200)), Duration::from_millis(300));
        assert_eq!(policy.next(Duration::from_millis(300)), Duration::from_millis(300));
    }
}
