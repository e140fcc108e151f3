// Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use signal_feed::{
    Action, ChangeEvent, ChangeNotifier, Confidence, FeedError, FeedResult, NewSignal,
    RecordStore, Session, Signal,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

/// Create a temporary directory for test databases
pub fn create_temp_db_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("signals.db");
    (temp_dir, db_path)
}

/// Build a stored signal with a fixed timestamp `minutes` after a base instant
pub fn sample_signal(pair: &str, action: Action, confidence: u8, session: Session, minutes: i64) -> Signal {
    let base = Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap();
    draft(pair, action, confidence, session)
        .created_at(base + Duration::minutes(minutes))
        .into_signal(Uuid::new_v4(), Utc::now())
}

pub fn draft(pair: &str, action: Action, confidence: u8, session: Session) -> NewSignal {
    NewSignal::new(pair, action, Confidence::new(confidence).expect("confidence in range"), session)
}

/// A varied set of `count` signals, oldest first
pub fn generate_test_signals(count: usize) -> Vec<Signal> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let pairs = ["EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD", "EUR/GBP"];

    (0..count)
        .map(|i| {
            let action = if rng.gen_bool(0.5) { Action::Buy } else { Action::Sell };
            let session = Session::ALL[rng.gen_range(0..Session::ALL.len())];
            sample_signal(
                pairs[rng.gen_range(0..pairs.len())],
                action,
                rng.gen_range(0..=100),
                session,
                i as i64,
            )
        })
        .collect()
}

pub fn pairs(signals: &[Signal]) -> Vec<String> {
    signals.iter().map(|s| s.pair.clone()).collect()
}

/// In-memory record store with failure toggles and call counters
#[derive(Default)]
pub struct FakeStore {
    signals: Mutex<Vec<Signal>>,
    pub fail_fetch: AtomicBool,
    pub fail_delete: AtomicBool,
    pub selects: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeStore {
    pub fn with_signals(signals: Vec<Signal>) -> Arc<Self> {
        Arc::new(FakeStore {
            signals: Mutex::new(signals),
            ..FakeStore::default()
        })
    }

    pub fn push(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }

    pub fn len(&self) -> usize {
        self.signals.lock().unwrap().len()
    }

    pub fn select_calls(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn select_all(&self) -> FeedResult<Vec<Signal>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FeedError::Fetch("connection refused".to_string()));
        }
        Ok(self.signals.lock().unwrap().clone())
    }

    async fn delete_all(&self) -> FeedResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(FeedError::Delete("permission denied".to_string()));
        }
        let mut signals = self.signals.lock().unwrap();
        let deleted = signals.len() as u64;
        signals.clear();
        Ok(deleted)
    }
}

pub type Gate = oneshot::Sender<FeedResult<Vec<Signal>>>;

/// Record store whose n-th `select_all` call blocks until the n-th gate is
/// resolved, so tests can choose the order in which fetches complete.
pub struct GatedStore {
    calls: AtomicUsize,
    pending: Mutex<Vec<Option<oneshot::Receiver<FeedResult<Vec<Signal>>>>>>,
    delete_calls: AtomicUsize,
    delete_gate: Mutex<Option<oneshot::Receiver<FeedResult<u64>>>>,
}

impl GatedStore {
    pub fn new(loads: usize) -> (Arc<Self>, Vec<Gate>) {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..loads)
            .map(|_| {
                let (tx, rx) = oneshot::channel();
                (tx, Some(rx))
            })
            .unzip();

        let store = Arc::new(GatedStore {
            calls: AtomicUsize::new(0),
            pending: Mutex::new(receivers),
            delete_calls: AtomicUsize::new(0),
            delete_gate: Mutex::new(None),
        });
        (store, senders)
    }

    /// Make the next `delete_all` wait for the returned gate
    pub fn gate_delete(&self) -> oneshot::Sender<FeedResult<u64>> {
        let (tx, rx) = oneshot::channel();
        *self.delete_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub async fn wait_for_deletes(&self, n: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.delete_calls.load(Ordering::SeqCst) < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("delete was not called in time");
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches have reached the store
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("store was not called in time");
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn select_all(&self) -> FeedResult<Vec<Signal>> {
        let gate = {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut pending = self.pending.lock().unwrap();
            let taken = pending.get_mut(index).and_then(Option::take);
            taken
        };

        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FeedError::Fetch("gate dropped".to_string()))),
            None => Err(FeedError::Fetch("unexpected fetch".to_string())),
        }
    }

    async fn delete_all(&self) -> FeedResult<u64> {
        let gate = {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.delete_gate.lock().unwrap();
            let taken = gate.take();
            taken
        };

        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FeedError::Delete("gate dropped".to_string()))),
            None => Ok(0),
        }
    }
}

/// Notifier that refuses the first `failures` subscription attempts
pub struct FlakyNotifier {
    tx: broadcast::Sender<ChangeEvent>,
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyNotifier {
    pub fn new(failures: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(FlakyNotifier {
            tx,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn publish(&self) {
        let _ = self.tx.send(ChangeEvent);
    }
}

impl ChangeNotifier for FlakyNotifier {
    fn subscribe(&self) -> FeedResult<broadcast::Receiver<ChangeEvent>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if refused {
            Err(FeedError::Subscription("realtime channel unavailable".to_string()))
        } else {
            Ok(self.tx.subscribe())
        }
    }
}

/// Poll `condition` until it holds or a 5 second deadline passes
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
