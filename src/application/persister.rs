// Bulk persister - batched inserts with row-level fallback
use crate::application::error::{StoreError, SyncError};
use crate::application::record_store::RecordStore;
use crate::domain::reading::PersistableRecord;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// False only when persistence stopped early because the store was
    /// unreachable. Rejected batches and rows still count as completed.
    pub completed: bool,
    pub saved: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BulkPersister {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl BulkPersister {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Best-effort write of `records`.
    ///
    /// Each batch is inserted in one call. When the store rejects a batch
    /// its rows are retried one at a time and rejected rows are logged and
    /// skipped, so a partial write is the normal outcome under transient
    /// store errors.
    pub async fn persist(&self, records: &[PersistableRecord]) -> PersistReport {
        if records.is_empty() {
            tracing::info!("No records to save");
            return PersistReport {
                completed: true,
                ..PersistReport::default()
            };
        }

        let started = Instant::now();
        tracing::debug!(records = records.len(), batch_size = self.batch_size, "Saving records");

        let mut report = PersistReport {
            completed: true,
            ..PersistReport::default()
        };
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let batch_no = index + 1;
            match self.store.insert(batch).await {
                Ok(saved) => {
                    tracing::debug!(batch = batch_no, saved, "Batch saved");
                    report.saved += saved;
                    report.failed += batch.len().saturating_sub(saved);
                }
                Err(e) if e.is_unreachable() => {
                    tracing::error!(batch = batch_no, "Store unreachable, stopping: {}", e);
                    report.completed = false;
                    report.failed += records.len() - index * self.batch_size;
                    break;
                }
                Err(e) => {
                    let err = SyncError::PersistBatch { batch: batch_no, source: e };
                    tracing::warn!("{}; retrying rows individually", err);
                    if let Err(e) = self.persist_rows(batch, &mut report).await {
                        tracing::error!(batch = batch_no, "Store unreachable, stopping: {}", e);
                        report.completed = false;
                        let done = (index + 1) * self.batch_size;
                        report.failed += records.len().saturating_sub(done);
                        break;
                    }
                }
            }
        }

        tracing::info!(
            saved = report.saved,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Records saved"
        );
        report
    }

    /// Insert `batch` row by row. Stops with the error only if the store
    /// becomes unreachable; the rows not yet attempted are counted as failed.
    async fn persist_rows(
        &self,
        batch: &[PersistableRecord],
        report: &mut PersistReport,
    ) -> Result<(), StoreError> {
        for (offset, row) in batch.iter().enumerate() {
            match self.store.insert(std::slice::from_ref(row)).await {
                Ok(saved) if saved > 0 => report.saved += 1,
                Ok(_) => report.failed += 1,
                Err(e) if e.is_unreachable() => {
                    report.failed += batch.len() - offset;
                    return Err(e);
                }
                Err(e) => {
                    let err = SyncError::PersistRow {
                        sensor_id: row.sensor_company_id.clone(),
                        source: e,
                    };
                    tracing::warn!("{}", err);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::record_store::MockRecordStore;
    use chrono::NaiveDate;
    use mockall::Sequence;

    fn record(sensor_id: &str) -> PersistableRecord {
        let at = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(7, 0, 0).unwrap();
        PersistableRecord {
            sensor_company_id: sensor_id.to_string(),
            sensor_name: "Rain".into(),
            sensor_unit: "mm".into(),
            device_id: None,
            device_name: None,
            gps_location_lat: None,
            gps_location_lng: None,
            datetime: Some("2024-05-02 06:00:00".into()),
            value_calibration: Some(1.0),
            value_raw: Some(1.0),
            timestamp: at,
            raw_data: "{}".into(),
            created_at: at,
        }
    }

    fn records(n: usize) -> Vec<PersistableRecord> {
        (0..n).map(|i| record(&format!("s{}", i))).collect()
    }

    fn rejected() -> StoreError {
        StoreError::Rejected { status: 400, body: "bad row".into() }
    }

    #[tokio::test]
    async fn test_empty_input_is_a_noop() {
        let persister = BulkPersister::new(Arc::new(MockRecordStore::new()), 10);
        let report = persister.persist(&[]).await;
        assert_eq!(report, PersistReport { completed: true, saved: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_splits_into_fixed_size_batches() {
        let mut store = MockRecordStore::new();
        let mut seq = Sequence::new();
        for size in [1000, 1000, 500] {
            store
                .expect_insert()
                .withf(move |rows| rows.len() == size)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|rows| Ok(rows.len()));
        }
        let persister = BulkPersister::new(Arc::new(store), DEFAULT_BATCH_SIZE);

        let report = persister.persist(&records(2500)).await;
        assert_eq!(report, PersistReport { completed: true, saved: 2500, failed: 0 });
    }

    #[tokio::test]
    async fn test_rejected_batch_falls_back_to_rows() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .withf(|rows| rows.len() > 1)
            .times(1)
            .returning(|_| Err(rejected()));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 1 && rows[0].sensor_company_id == "s2")
            .times(1)
            .returning(|_| Err(rejected()));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 1 && rows[0].sensor_company_id != "s2")
            .times(4)
            .returning(|_| Ok(1));
        let persister = BulkPersister::new(Arc::new(store), 10);

        let report = persister.persist(&records(5)).await;
        assert!(report.completed);
        assert_eq!(report.saved, 4);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_failure_in_one_batch_does_not_stop_the_next() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .withf(|rows| rows.len() == 2 && rows[0].sensor_company_id == "s0")
            .times(1)
            .returning(|_| Err(rejected()));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 1)
            .times(2)
            .returning(|_| Err(rejected()));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 2 && rows[0].sensor_company_id == "s2")
            .times(1)
            .returning(|_| Ok(2));
        let persister = BulkPersister::new(Arc::new(store), 2);

        let report = persister.persist(&records(4)).await;
        assert_eq!(report, PersistReport { completed: true, saved: 2, failed: 2 });
    }

    #[tokio::test]
    async fn test_unreachable_during_row_retry_stops_remaining_batches() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .withf(|rows| rows.len() == 2)
            .times(1)
            .returning(|_| Err(rejected()));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 1 && rows[0].sensor_company_id == "s0")
            .times(1)
            .returning(|_| Ok(1));
        store
            .expect_insert()
            .withf(|rows| rows.len() == 1 && rows[0].sensor_company_id == "s1")
            .times(1)
            .returning(|_| Err(StoreError::Unreachable("reset".into())));
        let persister = BulkPersister::new(Arc::new(store), 2);

        let report = persister.persist(&records(5)).await;
        assert_eq!(report, PersistReport { completed: false, saved: 1, failed: 4 });
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_incomplete() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .times(1)
            .returning(|_| Err(StoreError::Unreachable("connection refused".into())));
        let persister = BulkPersister::new(Arc::new(store), 2);

        let report = persister.persist(&records(5)).await;
        assert!(!report.completed);
        assert_eq!(report.saved, 0);
        assert_eq!(report.failed, 5);
    }
}
