// Error taxonomy for the sync pipeline
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Telemetry credentials are not configured")]
    MissingCredentials,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not authenticated: login must succeed before {0}")]
    NotAuthenticated(&'static str),

    #[error("Cannot build a {0} day fetch window")]
    InvalidWindow(u32),

    #[error("Inventory fetch failed: {0}")]
    InventoryFetch(String),

    #[error("Reading fetch failed for sensor {sensor_id}: {reason}")]
    ReadingFetch { sensor_id: String, reason: String },

    #[error("Failed to serialize reading: {0}")]
    TransformSerialization(String),

    #[error("Batch {batch} insert failed: {source}")]
    PersistBatch {
        batch: usize,
        #[source]
        source: StoreError,
    },

    #[error("Row insert failed for sensor {sensor_id}: {source}")]
    PersistRow {
        sensor_id: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Errors that end the run rather than a single sensor or row.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, SyncError::MissingCredentials | SyncError::Auth(_))
    }
}

/// Failures reported by the destination store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered but refused the write.
    #[error("store rejected insert ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The store could not be reached at all.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("could not decode store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
