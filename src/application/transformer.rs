// Record transformer - flattens readings payloads into persistable rows
use crate::application::error::SyncError;
use crate::application::fetch_orchestrator::BatchResults;
use crate::domain::reading::{PersistableRecord, ReadingsResponse};
use crate::domain::sensor::{number, text, SensorDescriptor};
use chrono::NaiveDateTime;
use serde_json::{json, Value};
use std::collections::HashMap;

const DEFAULT_SENSOR_NAME: &str = "Unknown";
const DEFAULT_SENSOR_UNIT: &str = "mm";

/// Flatten every successful payload in `batch` into rows, joining each
/// reading with its sensor's device details.
///
/// Rows follow the order of `sensors`; payloads for sensors missing from it
/// come last, sorted by id. Every row of one call shares `processed_at`.
pub fn transform(
    batch: &BatchResults,
    sensors: &[SensorDescriptor],
    processed_at: NaiveDateTime,
) -> Vec<PersistableRecord> {
    if batch.is_empty() {
        return Vec::new();
    }
    let mut lookup: HashMap<&str, &SensorDescriptor> = HashMap::with_capacity(sensors.len());
    let mut order = Vec::with_capacity(batch.len());
    for sensor in sensors {
        let id = sensor.sensor_id.as_str();
        if !lookup.contains_key(id) {
            lookup.insert(id, sensor);
            order.push(id);
        }
    }
    let mut orphans: Vec<&str> = batch
        .sensor_ids()
        .filter(|id| !lookup.contains_key(id))
        .collect();
    orphans.sort_unstable();
    order.extend(orphans);

    let mut records = Vec::new();
    for sensor_id in order {
        let Some(payload) = batch.payload(sensor_id).filter(|p| p.is_ok()) else {
            continue;
        };
        let descriptor = lookup.get(sensor_id).copied();
        records.extend(transform_response(sensor_id, payload, descriptor, processed_at));
    }

    if let Some(sample) = records.first() {
        tracing::debug!(
            sensor_id = %sample.sensor_company_id,
            device_id = ?sample.device_id,
            device_name = ?sample.device_name,
            lat = ?sample.gps_location_lat,
            lng = ?sample.gps_location_lng,
            total = records.len(),
            "Transformed record sample"
        );
    }
    records
}

/// Rows for a single sensor's payload, in traversal order.
pub fn transform_response(
    sensor_id: &str,
    response: &ReadingsResponse,
    descriptor: Option<&SensorDescriptor>,
    processed_at: NaiveDateTime,
) -> Vec<PersistableRecord> {
    let mut records = Vec::with_capacity(response.reading_count());
    for group in &response.data.data {
        let master = group.sensor_master.as_ref();
        let sensor_name = master
            .and_then(|m| text(m.sensor_name.as_ref()))
            .unwrap_or_else(|| DEFAULT_SENSOR_NAME.to_string());
        let sensor_unit = master
            .and_then(|m| text(m.sensor_unit.as_ref()))
            .unwrap_or_else(|| DEFAULT_SENSOR_UNIT.to_string());

        for reading in &group.sensor_records {
            records.push(PersistableRecord {
                sensor_company_id: sensor_id.to_string(),
                sensor_name: sensor_name.clone(),
                sensor_unit: sensor_unit.clone(),
                device_id: descriptor.and_then(|d| d.device_id.clone()),
                device_name: descriptor.map(|d| d.device_name.clone()),
                gps_location_lat: descriptor.and_then(|d| d.latitude),
                gps_location_lng: descriptor.and_then(|d| d.longitude),
                datetime: text(reading.get("datetime")),
                value_calibration: number(reading.get("value_calibration")),
                value_raw: number(reading.get("value_raw")),
                timestamp: processed_at,
                raw_data: raw_payload(reading),
                created_at: processed_at,
            });
        }
    }
    records
}

/// The reading as JSON text, or a placeholder describing it if it cannot
/// be serialized. The row is kept either way.
fn raw_payload(reading: &Value) -> String {
    serde_json::to_string(reading).unwrap_or_else(|e| {
        let err = SyncError::TransformSerialization(e.to_string());
        tracing::warn!("{}; storing placeholder", err);
        placeholder_payload(&format!("{:?}", reading))
    })
}

fn placeholder_payload(data: &str) -> String {
    json!({"error": "JSON serialization failed", "data": data}).to_string()
}
