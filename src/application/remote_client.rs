// Remote data client - session, caches and dedup ledger around the telemetry API
use crate::application::cache::{FetchKey, SnapshotCache, TtlCache};
use crate::application::dedup::DedupLedger;
use crate::application::error::{SyncError, SyncResult};
use crate::application::telemetry_api::TelemetryApi;
use crate::domain::reading::ReadingsResponse;
use crate::domain::sensor::{flatten_devices, SensorDescriptor};
use crate::domain::session::{Credentials, Session};
use crate::domain::window::Window;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_reading_entries: usize,
    pub dedup_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_reading_entries: 500,
            dedup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub fresh_readings: usize,
    pub cached_readings: usize,
    pub ledger_entries: usize,
}

pub struct RemoteDataClient {
    api: Arc<dyn TelemetryApi>,
    session: RwLock<Option<Session>>,
    inventory: Mutex<SnapshotCache<Vec<SensorDescriptor>>>,
    readings: Mutex<TtlCache<FetchKey, Arc<ReadingsResponse>>>,
    ledger: DedupLedger,
}

impl RemoteDataClient {
    pub fn new(api: Arc<dyn TelemetryApi>, settings: CacheSettings) -> Self {
        Self {
            api,
            session: RwLock::new(None),
            inventory: Mutex::new(SnapshotCache::new(settings.ttl)),
            readings: Mutex::new(TtlCache::new(settings.ttl, settings.max_reading_entries)),
            ledger: DedupLedger::new(settings.dedup_interval),
        }
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> SyncResult<Session> {
        let session = self.api.login(credentials).await?;
        tracing::debug!(company_id = ?session.company_id, "Login succeeded");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn require_session(&self, operation: &'static str) -> SyncResult<Session> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(SyncError::NotAuthenticated(operation))
    }

    /// All sensors of the company with their device details.
    ///
    /// A fresh inventory is served from cache. On a miss the roster is
    /// fetched once and replaces the cache; a failed fetch never falls back
    /// to an expired roster.
    pub async fn list_sensors_with_device_info(&self) -> SyncResult<Vec<SensorDescriptor>> {
        if let Some(cached) = self.inventory.lock().await.get_at(Instant::now()) {
            tracing::debug!(sensors = cached.len(), "Using cached sensor inventory");
            return Ok(cached);
        }

        let session = self.require_session("listing sensors").await?;
        tracing::debug!("Fetching sensor inventory");
        let devices = self.api.list_devices(&session).await?;
        let device_count = devices.len();
        let sensors = flatten_devices(devices);

        self.inventory
            .lock()
            .await
            .replace_at(sensors.clone(), Instant::now());

        if sensors.is_empty() {
            tracing::warn!(devices = device_count, "No sensors registered on any device");
        } else {
            tracing::debug!(
                devices = device_count,
                sensors = sensors.len(),
                "Sensor inventory loaded"
            );
        }
        Ok(sensors)
    }

    /// Readings for one sensor over `window`, served from cache when
    /// `use_cache` is set and a fresh entry exists.
    pub async fn fetch_readings(
        &self,
        sensor_id: &str,
        window: &Window,
        use_cache: bool,
    ) -> SyncResult<Arc<ReadingsResponse>> {
        let session = self.require_session("fetching readings").await?;
        let key = FetchKey::new(sensor_id, *window);

        if use_cache {
            if let Some(hit) = self.readings.lock().await.get(&key) {
                tracing::debug!(sensor_id, "Using cached readings");
                return Ok(hit);
            }
        }

        let response = Arc::new(
            self.api
                .fetch_sensor_records(&session, sensor_id, window)
                .await?,
        );

        if use_cache {
            self.readings.lock().await.insert(key, response.clone());
        }
        Ok(response)
    }

    pub fn dedup_ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let (fresh_readings, cached_readings) = {
            let readings = self.readings.lock().await;
            (readings.fresh_len_at(Instant::now()), readings.len())
        };
        CacheStats {
            fresh_readings,
            cached_readings,
            ledger_entries: self.ledger.len().await,
        }
    }
}
