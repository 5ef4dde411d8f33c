// Port for the destination table
use crate::application::error::StoreError;
use crate::domain::reading::PersistableRecord;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Bulk insert `rows`, returning how many rows the store reports as written.
    async fn insert(&self, rows: &[PersistableRecord]) -> Result<usize, StoreError>;
}
