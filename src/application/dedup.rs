// Duplicate suppression for readings queries
use crate::application::cache::FetchKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Remembers when each `(sensor, window)` query last completed.
///
/// A key processed less than `interval` ago is reported as a duplicate.
/// Entries are never evicted; the ledger lives as long as its client.
///
/// The ledger also hands out one async lock per key so that the
/// check / fetch / mark sequence for a key is never interleaved with another
/// request for the same key.
#[derive(Debug)]
pub struct DedupLedger {
    interval: Duration,
    processed: Mutex<HashMap<FetchKey, Instant>>,
    in_flight: Mutex<HashMap<FetchKey, Arc<Mutex<()>>>>,
}

impl DedupLedger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            processed: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Age of the last processing of `key`, if it is still inside the
    /// suppression interval.
    pub async fn recently_processed(&self, key: &FetchKey) -> Option<Duration> {
        self.recently_processed_at(key, Instant::now()).await
    }

    pub async fn recently_processed_at(&self, key: &FetchKey, now: Instant) -> Option<Duration> {
        let processed = self.processed.lock().await;
        processed
            .get(key)
            .map(|last| now.saturating_duration_since(*last))
            .filter(|age| *age < self.interval)
    }

    pub async fn mark_processed(&self, key: FetchKey) {
        self.mark_processed_at(key, Instant::now()).await;
    }

    pub async fn mark_processed_at(&self, key: FetchKey, now: Instant) {
        self.processed.lock().await.insert(key, now);
    }

    pub async fn len(&self) -> usize {
        self.processed.lock().await.len()
    }

    /// Exclusive access to `key` until the returned guard is dropped.
    pub async fn lock_key(&self, key: &FetchKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.entry(key.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
