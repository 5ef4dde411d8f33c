// Sensor inventory domain model
use serde::Deserialize;
use serde_json::Value;

/// One rainfall sensor joined with the device that hosts it.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescriptor {
    pub sensor_id: String,
    pub device_id: Option<String>,
    pub device_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A device as returned by `GET /devices`.
///
/// Every field is optional on the wire and several have alternative names,
/// so the raw shape is kept loose here and resolved once in
/// [`DeviceRecord::into_descriptors`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceRecord {
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub device_name: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub gps_location_lat: Option<Value>,
    #[serde(default)]
    pub device_latitude: Option<Value>,
    #[serde(default)]
    pub gps_location_lng: Option<Value>,
    #[serde(default)]
    pub device_longitude: Option<Value>,
    #[serde(default)]
    pub sensor_companies: Vec<SensorCompany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorCompany {
    #[serde(default)]
    pub sensor_company_id: Option<Value>,
}

impl DeviceRecord {
    /// Resolve the device fields and emit one descriptor per owned sensor.
    ///
    /// Name order: `device_name`, then `name`, then `Device_<id>`.
    /// Coordinates prefer the `gps_location_*` fields over `device_*`.
    pub fn into_descriptors(self) -> Vec<SensorDescriptor> {
        let device_id = text(self.device_id.as_ref());
        let device_name = text(self.device_name.as_ref())
            .or_else(|| text(self.name.as_ref()))
            .unwrap_or_else(|| {
                format!("Device_{}", device_id.as_deref().unwrap_or("Unknown"))
            });
        let latitude = number(first_present(&[
            self.gps_location_lat.as_ref(),
            self.device_latitude.as_ref(),
        ]));
        let longitude = number(first_present(&[
            self.gps_location_lng.as_ref(),
            self.device_longitude.as_ref(),
        ]));

        let mut descriptors = Vec::with_capacity(self.sensor_companies.len());
        for sensor in self.sensor_companies {
            let Some(sensor_id) = text(sensor.sensor_company_id.as_ref()) else {
                tracing::warn!(
                    device_id = device_id.as_deref().unwrap_or("unknown"),
                    "Skipping sensor without sensor_company_id"
                );
                continue;
            };
            descriptors.push(SensorDescriptor {
                sensor_id,
                device_id: device_id.clone(),
                device_name: device_name.clone(),
                latitude,
                longitude,
            });
        }
        descriptors
    }
}

/// Flatten a device roster into per-sensor descriptors, preserving order.
pub fn flatten_devices(devices: Vec<DeviceRecord>) -> Vec<SensorDescriptor> {
    devices
        .into_iter()
        .flat_map(DeviceRecord::into_descriptors)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn first_present<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a Value> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|value| !is_blank(value))
}

/// Non-blank strings pass through, numbers and booleans are stringified.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lenient numeric coercion: JSON numbers and numeric strings, else `None`.
pub fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(value: Value) -> DeviceRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_device_with_two_sensors_yields_two_descriptors() {
        let record = device(json!({
            "device_id": "dev-1",
            "device_name": "North Ridge",
            "gps_location_lat": "-6.2",
            "gps_location_lng": 106.8,
            "sensor_companies": [
                {"sensor_company_id": "s-1"},
                {"sensor_company_id": "s-2"}
            ]
        }));

        let descriptors = record.into_descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].sensor_id, "s-1");
        assert_eq!(descriptors[1].sensor_id, "s-2");
        for d in &descriptors {
            assert_eq!(d.device_id.as_deref(), Some("dev-1"));
            assert_eq!(d.device_name, "North Ridge");
            assert_eq!(d.latitude, Some(-6.2));
            assert_eq!(d.longitude, Some(106.8));
        }
    }

    #[test]
    fn test_device_name_fallback_order() {
        let named = device(json!({
            "device_id": 7, "name": "Generic",
            "sensor_companies": [{"sensor_company_id": "a"}]
        }));
        assert_eq!(named.into_descriptors()[0].device_name, "Generic");

        let blank = device(json!({
            "device_id": 7, "device_name": "",
            "sensor_companies": [{"sensor_company_id": "a"}]
        }));
        let d = blank.into_descriptors();
        assert_eq!(d[0].device_name, "Device_7");
        assert_eq!(d[0].device_id.as_deref(), Some("7"));

        let anonymous = device(json!({"sensor_companies": [{"sensor_company_id": "a"}]}));
        assert_eq!(anonymous.into_descriptors()[0].device_name, "Device_Unknown");
    }

    #[test]
    fn test_coordinate_fallback_and_coercion() {
        let record = device(json!({
            "gps_location_lat": null,
            "device_latitude": "1.5",
            "gps_location_lng": "",
            "device_longitude": "east",
            "sensor_companies": [{"sensor_company_id": "a"}]
        }));
        let d = &record.into_descriptors()[0];
        assert_eq!(d.latitude, Some(1.5));
        assert_eq!(d.longitude, None);
    }

    #[test]
    fn test_device_without_sensors_and_sensor_without_id() {
        assert!(device(json!({"device_id": "x"})).into_descriptors().is_empty());

        let record = device(json!({"sensor_companies": [{}, {"sensor_company_id": "ok"}]}));
        let d = record.into_descriptors();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].sensor_id, "ok");
    }

    #[test]
    fn test_flatten_devices_preserves_order() {
        let devices = vec![
            device(json!({"device_id": "d1", "sensor_companies": [{"sensor_company_id": "a"}]})),
            device(json!({"device_id": "d2", "sensor_companies": []})),
            device(json!({
                "device_id": "d3",
                "sensor_companies": [{"sensor_company_id": "b"}, {"sensor_company_id": "c"}]
            })),
        ];
        let ids: Vec<_> = flatten_devices(devices).into_iter().map(|d| d.sensor_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(number(Some(&json!(2))), Some(2.0));
        assert_eq!(number(Some(&json!(" 3.25 "))), Some(3.25));
        assert_eq!(number(Some(&json!("NaN"))), None);
        assert_eq!(number(Some(&json!(true))), None);
        assert_eq!(number(None), None);
    }
}
