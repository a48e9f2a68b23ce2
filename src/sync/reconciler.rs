//! Timer-driven reconciliation against the authoritative store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::{MergeStats, ThreadCache};
use crate::traits::RecordStore;

/// Periodically re-fetches the authoritative record list and merges it
/// into the cache, but only while the system is quiescent: a tick that
/// finds pending operations is skipped outright, not deferred, so a slow
/// fetch can never land between an optimistic mutation and its own
/// confirmation and overwrite it.
pub struct Reconciler {
    cache: Arc<Mutex<ThreadCache>>,
    store: Arc<dyn RecordStore>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        cache: Arc<Mutex<ThreadCache>>,
        store: Arc<dyn RecordStore>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            interval,
        }
    }

    /// Run one reconcile pass. Returns the merge stats, or `None` when the
    /// tick was skipped or the fetch failed.
    pub async fn tick(&self) -> Option<MergeStats> {
        {
            let cache = self.cache.lock().unwrap();
            if cache.has_pending() {
                tracing::debug!("reconcile tick skipped: operations pending");
                return None;
            }
        }

        let records = match self.store.list().await {
            Ok(records) => records,
            Err(err) => {
                // Local state stays authoritative until the next tick
                tracing::warn!("reconcile fetch failed: {err}");
                return None;
            }
        };

        let mut cache = self.cache.lock().unwrap();
        // An operation may have started while the fetch was in flight;
        // its records would be guarded, but the cheap answer is to drop
        // the whole stale snapshot.
        if cache.has_pending() {
            tracing::debug!("reconcile result dropped: operations started mid-fetch");
            return None;
        }
        Some(cache.merge_authoritative(records))
    }

    /// Spawn the interval loop. Ticks that overlap a slow fetch are
    /// skipped rather than bunched.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; that doubles as the
            // initial load of the record list.
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
