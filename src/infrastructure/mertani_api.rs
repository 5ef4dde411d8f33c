// Mertani telemetry API adapter
use crate::application::error::{SyncError, SyncResult};
use crate::application::telemetry_api::TelemetryApi;
use crate::domain::reading::{ReadingsResponse, STATUS_OK};
use crate::domain::sensor::{text, DeviceRecord};
use crate::domain::session::{Credentials, Session};
use crate::domain::window::Window;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Clone)]
pub struct MertaniApi {
    client: reqwest::Client,
    base_url: String,
    devices_limit: u32,
}

/// Every endpoint wraps its payload in `{status, data}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    strategy: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(default)]
    company_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DevicePage {
    #[serde(default)]
    data: Vec<DeviceRecord>,
}

impl MertaniApi {
    pub fn new(base_url: &str, devices_limit: u32, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            devices_limit,
        })
    }

    fn login_url(&self) -> String {
        format!("{}/users/login", self.base_url)
    }

    fn devices_url(&self, company_id: &str) -> String {
        format!(
            "{}/devices?company_id={}&limit={}",
            self.base_url,
            urlencoding::encode(company_id),
            self.devices_limit
        )
    }

    fn records_url(&self, sensor_id: &str, window: &Window) -> String {
        format!(
            "{}/sensors/records?sensor_company_id={}&start={}&end={}",
            self.base_url,
            urlencoding::encode(sensor_id),
            urlencoding::encode(&window.start_param()),
            urlencoding::encode(&window.end_param())
        )
    }

    async fn get_envelope(&self, url: &str, session: &Session) -> Result<Envelope, String> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, session.access_token.as_str())
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        read_envelope(response).await
    }
}

async fn read_envelope(response: reqwest::Response) -> Result<Envelope, String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("failed to read response body: {}", e))?;
    parse_envelope(&body).map_err(|e| format!("HTTP {}: {}", status, e))
}

/// Parse `{status, data}` and reject anything whose status is not `OK`.
fn parse_envelope(body: &str) -> Result<Envelope, String> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| format!("invalid JSON ({}): {}", e, truncate(body)))?;
    if envelope.status.as_deref() != Some(STATUS_OK) {
        return Err(format!("API reported failure: {}", truncate(body)));
    }
    Ok(envelope)
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, String> {
    serde_json::from_value(data).map_err(|e| format!("unexpected payload shape: {}", e))
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn session_from_login(data: LoginData) -> Result<Session, String> {
    let access_token = data
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "response did not contain an access token".to_string())?;
    let company_id = data.user.and_then(|u| text(u.company_id.as_ref()));
    Ok(Session {
        access_token,
        company_id,
    })
}

#[async_trait]
impl TelemetryApi for MertaniApi {
    async fn login(&self, credentials: &Credentials) -> SyncResult<Session> {
        let body = LoginRequest {
            strategy: "web",
            email: &credentials.email,
            password: &credentials.password,
        };
        let response = self
            .client
            .post(self.login_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("request failed: {}", e)))?;

        let envelope = read_envelope(response).await.map_err(SyncError::Auth)?;
        let session = decode::<LoginData>(envelope.data)
            .and_then(session_from_login)
            .map_err(SyncError::Auth)?;
        tracing::info!("Logged in to telemetry API");
        Ok(session)
    }

    async fn list_devices(&self, session: &Session) -> SyncResult<Vec<DeviceRecord>> {
        let company_id = session.company_id.as_deref().unwrap_or_default();
        let url = self.devices_url(company_id);
        tracing::debug!("GET {}", url);

        let envelope = self
            .get_envelope(&url, session)
            .await
            .map_err(SyncError::InventoryFetch)?;
        let page: DevicePage = decode(envelope.data).map_err(SyncError::InventoryFetch)?;
        Ok(page.data)
    }

    async fn fetch_sensor_records(
        &self,
        session: &Session,
        sensor_id: &str,
        window: &Window,
    ) -> SyncResult<ReadingsResponse> {
        let url = self.records_url(sensor_id, window);
        let reading_error = |reason: String| SyncError::ReadingFetch {
            sensor_id: sensor_id.to_string(),
            reason,
        };

        let envelope = self.get_envelope(&url, session).await.map_err(reading_error)?;
        let data = decode(envelope.data).map_err(reading_error)?;
        Ok(ReadingsResponse {
            status: STATUS_OK.to_string(),
            data,
        })
    }
}
