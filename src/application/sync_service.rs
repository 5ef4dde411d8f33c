// Sync service - Use case sequencing one run of the rainfall sync
use crate::application::error::{SyncError, SyncResult};
use crate::application::fetch_orchestrator::FetchOrchestrator;
use crate::application::persister::BulkPersister;
use crate::application::remote_client::RemoteDataClient;
use crate::application::transformer::transform;
use crate::domain::session::Credentials;
use crate::domain::window::Window;
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticated,
    InventoryLoaded,
    Fetched,
    Transformed,
    Persisted,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub credentials: Option<Credentials>,
    pub fetch_days: u32,
    pub max_workers: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total_sensors: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `(sensor_id, reason)` for every sensor whose fetch failed.
    pub failures: Vec<(String, String)>,
    pub records: usize,
    pub rows_saved: usize,
    pub persist_completed: bool,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub summary: RunSummary,
    /// Why the run ended in [`RunState::Failed`].
    pub failure: Option<SyncError>,
}

pub struct SyncService {
    client: Arc<RemoteDataClient>,
    orchestrator: FetchOrchestrator,
    persister: Option<BulkPersister>,
    settings: RunSettings,
    state: RunState,
}

impl SyncService {
    /// `persister` is `None` when no destination is configured; the run then
    /// stops after transforming.
    pub fn new(
        client: Arc<RemoteDataClient>,
        persister: Option<BulkPersister>,
        settings: RunSettings,
    ) -> Self {
        let orchestrator = FetchOrchestrator::new(client.clone(), settings.max_workers);
        Self {
            client,
            orchestrator,
            persister,
            settings,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "Run state change");
        self.state = next;
    }

    fn fail(&mut self, err: SyncError, summary: RunSummary) -> RunReport {
        tracing::error!("Run failed: {}", err);
        self.advance(RunState::Failed);
        RunReport {
            state: self.state,
            summary,
            failure: Some(err),
        }
    }

    fn finish(&mut self, mut summary: RunSummary, started: Instant) -> RunReport {
        summary.elapsed = started.elapsed();
        self.advance(RunState::Done);
        log_summary(&summary);
        RunReport {
            state: self.state,
            summary,
            failure: None,
        }
    }

    /// Run login, inventory, fetch, transform and persist once.
    ///
    /// Missing credentials and failed logins end in [`RunState::Failed`].
    /// Per-sensor and per-row failures only show up in the summary. An
    /// inventory failure is returned as an error.
    pub async fn run(&mut self) -> SyncResult<RunReport> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let Some(credentials) = self.settings.credentials.clone() else {
            return Ok(self.fail(SyncError::MissingCredentials, summary));
        };

        tracing::debug!("Logging in to telemetry API");
        if let Err(e) = self.client.authenticate(&credentials).await {
            if e.is_run_fatal() {
                return Ok(self.fail(e, summary));
            }
            return Err(e);
        }
        self.advance(RunState::Authenticated);

        tracing::debug!("Loading sensor inventory");
        let sensors = self.client.list_sensors_with_device_info().await?;
        self.advance(RunState::InventoryLoaded);
        summary.total_sensors = sensors.len();
        if sensors.is_empty() {
            tracing::warn!("No sensors available, nothing to sync");
            return Ok(self.finish(summary, started));
        }

        let days = self.settings.fetch_days;
        let window = Window::trailing_days(days, Local::now().naive_local())
            .ok_or(SyncError::InvalidWindow(days))?;
        tracing::debug!(%window, sensors = sensors.len(), "Fetching readings");
        let batch = self.orchestrator.fetch_all(&sensors, window).await;
        self.advance(RunState::Fetched);
        let counts = batch.counts();
        summary.fetched = counts.fetched;
        summary.skipped = counts.skipped;
        summary.failed = counts.failed;
        summary.failures = batch.failures();

        let Some(persister) = self.persister.clone() else {
            tracing::warn!("Destination store is not configured, skipping persistence");
            return Ok(self.finish(summary, started));
        };

        let records = transform(&batch, &sensors, Local::now().naive_local());
        self.advance(RunState::Transformed);
        summary.records = records.len();

        if records.is_empty() {
            tracing::warn!("No records produced by transform");
            summary.persist_completed = true;
        } else {
            let report = persister.persist(&records).await;
            summary.rows_saved = report.saved;
            summary.persist_completed = report.completed;
            if report.completed {
                tracing::info!("Sync complete");
            } else {
                tracing::error!("Sync incomplete: destination store stopped accepting rows");
            }
        }
        self.advance(RunState::Persisted);

        Ok(self.finish(summary, started))
    }
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        total_sensors = summary.total_sensors,
        fetched = summary.fetched,
        skipped = summary.skipped,
        failed = summary.failed,
        records = summary.records,
        rows_saved = summary.rows_saved,
        persist_completed = summary.persist_completed,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Run summary"
    );
    for (sensor_id, reason) in &summary.failures {
        tracing::warn!(sensor_id = %sensor_id, "Not synced: {}", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::StoreError;
    use crate::application::persister::DEFAULT_BATCH_SIZE;
    use crate::application::record_store::MockRecordStore;
    use crate::application::remote_client::tests::{credentials, readings, session};
    use crate::application::remote_client::CacheSettings;
    use crate::application::telemetry_api::MockTelemetryApi;
    use crate::domain::sensor::DeviceRecord;
    use serde_json::json;

    fn settings(credentials: Option<Credentials>) -> RunSettings {
        RunSettings {
            credentials,
            fetch_days: 1,
            max_workers: 4,
        }
    }

    fn three_sensor_roster() -> Vec<DeviceRecord> {
        serde_json::from_value(json!([
            {"device_id": "d1", "device_name": "North",
             "gps_location_lat": "-6.1", "gps_location_lng": "106.9",
             "sensor_companies": [{"sensor_company_id": "s1"}, {"sensor_company_id": "s2"}]},
            {"device_id": "d2", "name": "South", "sensor_companies": [{"sensor_company_id": "s3"}]}
        ]))
        .unwrap()
    }

    fn service(
        api: MockTelemetryApi,
        store: Option<MockRecordStore>,
        creds: Option<Credentials>,
    ) -> SyncService {
        let client = Arc::new(RemoteDataClient::new(Arc::new(api), CacheSettings::default()));
        let persister = store.map(|s| BulkPersister::new(Arc::new(s), DEFAULT_BATCH_SIZE));
        SyncService::new(client, persister, settings(creds))
    }

    #[tokio::test]
    async fn test_missing_credentials_fails_without_network() {
        // Any call on these mocks would panic.
        let mut svc = service(MockTelemetryApi::new(), Some(MockRecordStore::new()), None);

        let report = svc.run().await.unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(report.failure, Some(SyncError::MissingCredentials)));
        assert_eq!(svc.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_auth_failure_ends_in_failed_state() {
        let mut api = MockTelemetryApi::new();
        api.expect_login()
            .times(1)
            .returning(|_| Err(SyncError::Auth("status FAIL".into())));
        let mut svc = service(api, None, Some(credentials()));

        let report = svc.run().await.unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(report.failure, Some(SyncError::Auth(_))));
    }

    #[tokio::test]
    async fn test_inventory_failure_propagates() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().returning(|_| Ok(session()));
        api.expect_list_devices()
            .returning(|_| Err(SyncError::InventoryFetch("status ERROR".into())));
        let mut svc = service(api, None, Some(credentials()));

        assert!(matches!(svc.run().await, Err(SyncError::InventoryFetch(_))));
        assert_eq!(svc.state(), RunState::Authenticated);
    }

    #[tokio::test]
    async fn test_empty_inventory_finishes_without_fetching() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().returning(|_| Ok(session()));
        api.expect_list_devices().returning(|_| Ok(Vec::new()));
        let mut svc = service(api, Some(MockRecordStore::new()), Some(credentials()));

        let report = svc.run().await.unwrap();
        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.summary.total_sensors, 0);
        assert_eq!(report.summary.records, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_window_is_an_error() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().returning(|_| Ok(session()));
        api.expect_list_devices().returning(|_| Ok(three_sensor_roster()));
        api.expect_fetch_sensor_records().never();
        let client = Arc::new(RemoteDataClient::new(Arc::new(api), CacheSettings::default()));
        let mut settings = settings(Some(credentials()));
        settings.fetch_days = u32::MAX;
        let mut svc = SyncService::new(client, None, settings);

        assert!(matches!(svc.run().await, Err(SyncError::InvalidWindow(days)) if days == u32::MAX));
        assert_eq!(svc.state(), RunState::InventoryLoaded);
    }

    #[tokio::test]
    async fn test_end_to_end_partial_failure() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().times(1).returning(|_| Ok(session()));
        api.expect_list_devices().times(1).returning(|_| Ok(three_sensor_roster()));
        api.expect_fetch_sensor_records()
            .times(3)
            .returning(|_, sensor_id, _| match sensor_id {
                "s2" => Err(SyncError::ReadingFetch {
                    sensor_id: sensor_id.to_string(),
                    reason: "status ERROR".into(),
                }),
                _ => Ok(readings(4.2)),
            });

        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .times(1)
            .withf(|rows| {
                rows.len() == 2
                    && rows
                        .iter()
                        .all(|r| r.device_id.is_some() && r.value_calibration == Some(4.2))
                    && rows.iter().all(|r| r.sensor_company_id != "s2")
            })
            .returning(|rows| Ok(rows.len()));

        let mut svc = service(api, Some(store), Some(credentials()));
        let report = svc.run().await.unwrap();

        assert_eq!(report.state, RunState::Done);
        let summary = report.summary;
        assert_eq!(summary.total_sensors, 3);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "s2");
        assert_eq!(summary.records, 2);
        assert_eq!(summary.rows_saved, 2);
        assert!(summary.persist_completed);
    }

    #[tokio::test]
    async fn test_unreachable_store_still_finishes_run() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().returning(|_| Ok(session()));
        api.expect_list_devices().returning(|_| Ok(three_sensor_roster()));
        api.expect_fetch_sensor_records().returning(|_, _, _| Ok(readings(1.0)));
        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .returning(|_| Err(StoreError::Unreachable("dns".into())));

        let mut svc = service(api, Some(store), Some(credentials()));
        let report = svc.run().await.unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.summary.records, 3);
        assert_eq!(report.summary.rows_saved, 0);
        assert!(!report.summary.persist_completed);
    }

    #[tokio::test]
    async fn test_without_store_skips_persistence() {
        let mut api = MockTelemetryApi::new();
        api.expect_login().returning(|_| Ok(session()));
        api.expect_list_devices().returning(|_| Ok(three_sensor_roster()));
        api.expect_fetch_sensor_records().returning(|_, _, _| Ok(readings(1.0)));

        let mut svc = service(api, None, Some(credentials()));
        let report = svc.run().await.unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.summary.fetched, 3);
        assert_eq!(report.summary.rows_saved, 0);
    }
}
