// Port for the remote telemetry API
use crate::application::error::SyncResult;
use crate::domain::reading::ReadingsResponse;
use crate::domain::sensor::DeviceRecord;
use crate::domain::session::{Credentials, Session};
use crate::domain::window::Window;
use async_trait::async_trait;

/// One network round trip per method. Implementations map a non-`OK`
/// status or a transport failure to the matching [`SyncError`] kind.
///
/// [`SyncError`]: crate::application::error::SyncError
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// `POST /users/login`
    async fn login(&self, credentials: &Credentials) -> SyncResult<Session>;

    /// `GET /devices` for the session's company
    async fn list_devices(&self, session: &Session) -> SyncResult<Vec<DeviceRecord>>;

    /// `GET /sensors/records` for one sensor and window
    async fn fetch_sensor_records(
        &self,
        session: &Session,
        sensor_id: &str,
        window: &Window,
    ) -> SyncResult<ReadingsResponse>;
}
