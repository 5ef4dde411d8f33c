// Supabase (PostgREST) table adapter
use crate::application::error::StoreError;
use crate::application::record_store::RecordStore;
use crate::domain::reading::PersistableRecord;
use crate::infrastructure::config::StoreSettings;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    url: String,
    key: String,
    table: String,
}

impl SupabaseStore {
    pub fn new(settings: StoreSettings, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: settings.url.trim_end_matches('/').to_string(),
            key: settings.key,
            table: settings.table,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, urlencoding::encode(&self.table))
    }
}

/// PostgREST echoes the inserted rows with `return=representation`.
fn count_inserted(body: &str) -> Result<usize, StoreError> {
    if body.trim().is_empty() {
        return Ok(0);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(rows)) => Ok(rows.len()),
        Ok(other) => Err(StoreError::Decode(format!("expected an array, got {}", other))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn insert(&self, rows: &[PersistableRecord]) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        count_inserted(&body)
    }
}
