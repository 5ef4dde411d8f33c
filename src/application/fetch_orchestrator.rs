// Concurrent fetch orchestrator - bounded fan-out of readings queries
use crate::application::cache::FetchKey;
use crate::application::remote_client::RemoteDataClient;
use crate::domain::reading::ReadingsResponse;
use crate::domain::sensor::SensorDescriptor;
use crate::domain::window::Window;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Upper bound on concurrent fetches.
pub const MAX_WORKERS: usize = 32;
/// Tighter bound for shared CI runners.
pub const CI_MAX_WORKERS: usize = 8;

/// Clamp a requested pool size into the range allowed for the environment.
pub fn effective_workers(requested: usize, ci: bool) -> usize {
    let ceiling = if ci { CI_MAX_WORKERS } else { MAX_WORKERS };
    requested.clamp(1, ceiling)
}

/// Result of one sensor's fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(Arc<ReadingsResponse>),
    /// Same sensor and window were processed within the suppression interval.
    Skipped,
    Failed(String),
}

impl FetchOutcome {
    pub fn payload(&self) -> Option<&Arc<ReadingsResponse>> {
        match self {
            FetchOutcome::Fetched(payload) => Some(payload),
            FetchOutcome::Skipped | FetchOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed(_))
    }
}

/// One outcome per requested sensor, keyed by sensor id.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    outcomes: HashMap<String, FetchOutcome>,
}

impl BatchResults {
    pub fn insert(&mut self, sensor_id: String, outcome: FetchOutcome) {
        self.outcomes.insert(sensor_id, outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, sensor_id: &str) -> Option<&FetchOutcome> {
        self.outcomes.get(sensor_id)
    }

    /// `None` both for skipped duplicates and for failures.
    pub fn payload(&self, sensor_id: &str) -> Option<&Arc<ReadingsResponse>> {
        self.get(sensor_id).and_then(FetchOutcome::payload)
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(String::as_str)
    }

    /// `(sensor_id, reason)` for each failed sensor, sorted by sensor id.
    pub fn failures(&self) -> Vec<(String, String)> {
        let mut failures: Vec<_> = self
            .outcomes
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                FetchOutcome::Failed(reason) => Some((id.clone(), reason.clone())),
                _ => None,
            })
            .collect();
        failures.sort();
        failures
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for outcome in self.outcomes.values() {
            if !outcome.is_success() {
                counts.failed += 1;
            } else if outcome.payload().is_some() {
                counts.fetched += 1;
            } else {
                counts.skipped += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn succeeded(&self) -> usize {
        self.fetched + self.skipped
    }
}

pub struct FetchOrchestrator {
    client: Arc<RemoteDataClient>,
    max_workers: usize,
}

impl FetchOrchestrator {
    pub fn new(client: Arc<RemoteDataClient>, max_workers: usize) -> Self {
        Self {
            client,
            max_workers: max_workers.max(1),
        }
    }

    /// Fetch every sensor's readings for `window`, at most `max_workers` at
    /// a time. Returns once every fetch has finished; a failing sensor is
    /// recorded and never stops the others.
    ///
    /// A sensor id listed more than once is fetched for its first entry only.
    pub async fn fetch_all(&self, sensors: &[SensorDescriptor], window: Window) -> BatchResults {
        let started = Instant::now();
        let mut seen = HashSet::new();
        let sensors: Vec<&SensorDescriptor> = sensors
            .iter()
            .filter(|sensor| seen.insert(sensor.sensor_id.as_str()))
            .collect();
        let permits = Arc::new(Semaphore::new(self.max_workers));
        tracing::debug!(
            sensors = sensors.len(),
            workers = self.max_workers,
            %window,
            "Starting parallel fetch"
        );

        let tasks = sensors.iter().map(|sensor| {
            let client = self.client.clone();
            let permits = permits.clone();
            let sensor_id = sensor.sensor_id.clone();
            let label = sensor.device_name.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                fetch_one(&client, &sensor_id, &label, window).await
            })
        });
        let joined = join_all(tasks).await;

        let mut results = BatchResults::default();
        for (sensor, joined) in sensors.iter().zip(joined) {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::error!(
                    sensor_id = %sensor.sensor_id,
                    device = %sensor.device_name,
                    "Fetch task aborted: {}",
                    e
                );
                FetchOutcome::Failed(format!("fetch task aborted: {}", e))
            });
            results.insert(sensor.sensor_id.clone(), outcome);
        }

        let counts = results.counts();
        let stats = self.client.cache_stats().await;
        tracing::info!(
            succeeded = counts.succeeded(),
            total = results.len(),
            skipped = counts.skipped,
            failed = counts.failed,
            fresh_cache_entries = stats.fresh_readings,
            cached_entries = stats.cached_readings,
            ledger_entries = stats.ledger_entries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Parallel fetch finished"
        );
        results
    }
}

async fn fetch_one(
    client: &RemoteDataClient,
    sensor_id: &str,
    label: &str,
    window: Window,
) -> FetchOutcome {
    let key = FetchKey::new(sensor_id, window);
    let ledger = client.dedup_ledger();
    let _key_guard = ledger.lock_key(&key).await;

    if let Some(age) = ledger.recently_processed(&key).await {
        tracing::debug!(
            sensor_id,
            device = label,
            age_secs = age.as_secs(),
            "Skipping duplicate fetch"
        );
        return FetchOutcome::Skipped;
    }

    match client.fetch_readings(sensor_id, &window, true).await {
        Ok(payload) => {
            ledger.mark_processed(key).await;
            tracing::debug!(
                sensor_id,
                device = label,
                readings = payload.reading_count(),
                "Sensor fetch complete"
            );
            FetchOutcome::Fetched(payload)
        }
        Err(e) => {
            tracing::warn!(sensor_id, device = label, "Sensor fetch failed: {}", e);
            FetchOutcome::Failed(e.to_string())
        }
    }
}
