// Readings payload and persistence row domain models
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_OK: &str = "OK";

/// Body of `GET /sensors/records`, kept close to the wire shape so the
/// individual sensor records can be stored verbatim.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ReadingsResponse {
    pub status: String,
    #[serde(default)]
    pub data: ReadingsPage,
}

impl ReadingsResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn reading_count(&self) -> usize {
        self.data.data.iter().map(|g| g.sensor_records.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ReadingsPage {
    #[serde(default)]
    pub data: Vec<SensorGroup>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SensorGroup {
    #[serde(default)]
    pub sensor_master: Option<SensorMaster>,
    #[serde(default)]
    pub sensor_records: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SensorMaster {
    #[serde(default)]
    pub sensor_name: Option<Value>,
    #[serde(default)]
    pub sensor_unit: Option<Value>,
}

/// Flat row written to the destination table.
///
/// `timestamp` and `created_at` both carry the processing time shared by
/// every row of one transform pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistableRecord {
    pub sensor_company_id: String,
    pub sensor_name: String,
    pub sensor_unit: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub gps_location_lat: Option<f64>,
    pub gps_location_lng: Option<f64>,
    pub datetime: Option<String>,
    pub value_calibration: Option<f64>,
    pub value_raw: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub raw_data: String,
    pub created_at: NaiveDateTime,
}
