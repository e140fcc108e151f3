//! Entry points consumed by the presentation layer
//!
//! A [`Dashboard`] owns the sync cache subscription for as long as the view is
//! open, holds the current filter criteria and settings, and derives the
//! visible sequence and statistics from immutable snapshots on demand.

use crate::error::FeedResult;
use crate::feed::{
    self, ChangeNotifier, DatasetFootprint, LoadOutcome, RecordStore, ResubscribePolicy,
    Snapshot, Subscription, SyncCache, SyncStatus,
};
use crate::settings::{DurableStorage, SaveAck, Settings, SettingsStore};
use crate::types::{FilterCriteria, Signal, Stats};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Everything the signal history view renders
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub visible: Vec<Signal>,
    /// Statistics over the full set, not the filtered subset
    pub stats: Stats,
    pub shown: usize,
    pub total: usize,
    pub status: SyncStatus,
}

impl DashboardView {
    pub fn summary(&self) -> String {
        format!("Showing {} of {} signals", self.shown, self.total)
    }
}

/// Explicit answer to "clear all signals?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The user declined; nothing was touched
    Cancelled,
    /// The store confirmed deletion and the local view is empty
    Cleared { deleted: u64 },
}

impl ClearOutcome {
    pub fn acknowledgement(&self) -> Option<String> {
        match self {
            ClearOutcome::Cancelled => None,
            ClearOutcome::Cleared { deleted } => {
                Some(format!("Database cleared successfully ({} signals removed)", deleted))
            }
        }
    }
}

pub struct Dashboard {
    cache: Arc<SyncCache>,
    subscription: Option<Subscription>,
    criteria: FilterCriteria,
    settings_store: SettingsStore,
    settings: Settings,
}

impl Dashboard {
    /// Load settings, perform the initial fetch and start live updates.
    ///
    /// A failed initial fetch is not fatal: the view opens empty with the
    /// error in [`SyncStatus::last_error`].
    pub async fn open(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn ChangeNotifier>,
        storage: Arc<dyn DurableStorage>,
        policy: ResubscribePolicy,
    ) -> Self {
        let settings_store = SettingsStore::new(storage);
        let settings = settings_store.load();

        let cache = Arc::new(SyncCache::new(store));
        // Listen first: a change announced during the initial fetch still
        // triggers a reload
        let subscription = cache.subscribe(notifier, policy);
        if let Err(e) = cache.load().await {
            warn!(error = %e, "initial signal load failed");
        }

        info!(signals = cache.snapshot().len(), "📊 Dashboard opened");

        Dashboard {
            cache,
            subscription: Some(subscription),
            criteria: FilterCriteria::default(),
            settings_store,
            settings,
        }
    }

    pub fn view(&self) -> DashboardView {
        let snapshot = self.cache.snapshot();
        let visible = feed::visible(&snapshot, &self.criteria);

        DashboardView {
            stats: feed::stats(&snapshot),
            shown: visible.len(),
            total: snapshot.len(),
            visible,
            status: self.cache.status(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.cache.snapshot()
    }

    pub fn status(&self) -> SyncStatus {
        self.cache.status()
    }

    /// Marked changed whenever the signal sequence is replaced
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.cache.updates()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn set_filter_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    pub async fn refresh(&self) -> FeedResult<LoadOutcome> {
        self.cache.load().await
    }

    pub fn footprint(&self) -> FeedResult<DatasetFootprint> {
        feed::footprint(&self.cache.snapshot())
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Persist `settings`; the in-memory copy only changes once the write succeeded
    pub fn save_settings(&mut self, settings: Settings) -> FeedResult<SaveAck> {
        let ack = self.settings_store.save(&settings)?;
        self.settings = ack.settings;
        Ok(ack)
    }

    pub async fn clear_all_signals(&self, confirmation: Confirmation) -> FeedResult<ClearOutcome> {
        if confirmation == Confirmation::Declined {
            info!("clear all signals declined");
            return Ok(ClearOutcome::Cancelled);
        }

        let deleted = self.cache.clear_all().await?;
        Ok(ClearOutcome::Cleared { deleted })
    }

    /// Release the live subscription; the dashboard stops following the store
    pub async fn close(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
        info!("Dashboard closed");
    }
}
