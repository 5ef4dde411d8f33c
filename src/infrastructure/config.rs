use crate::application::persister::DEFAULT_BATCH_SIZE;
use crate::application::remote_client::CacheSettings;
use crate::application::sync_service::RunSettings;
use crate::domain::session::Credentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Longest fetch window accepted from configuration.
pub const MAX_FETCH_DAYS: u32 = 3650;

/// Process configuration, read from `config/sync.*` (optional) and then
/// from environment variables, which win. Keys are the lower-cased
/// environment variable names.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub mertani_user_email: Option<String>,
    #[serde(default)]
    pub mertani_user_password: Option<String>,
    #[serde(default = "default_base_url")]
    pub mertani_base_url: String,

    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
    #[serde(default = "default_table_name")]
    pub weather_table_name: String,

    /// Set to `true` by GitHub Actions; selects quieter logging and a
    /// smaller fetch pool.
    #[serde(default)]
    pub github_actions: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_dedup_interval_secs")]
    pub dedup_interval_secs: u64,
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,
    #[serde(default = "default_devices_limit")]
    pub devices_limit: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_fetch_days")]
    pub fetch_days: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://data.mertani.co.id".to_string()
}

fn default_table_name() -> String {
    "rainfall_data".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_dedup_interval_secs() -> u64 {
    60
}

fn default_max_cache_entries() -> usize {
    500
}

fn default_devices_limit() -> u32 {
    50
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_workers() -> usize {
    10
}

fn default_fetch_days() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Destination table connection details.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl SyncConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.mertani_user_email.clone(),
            self.mertani_user_password.clone(),
        )
    }

    /// `None` unless both the URL and the key are set.
    pub fn store_settings(&self) -> Option<StoreSettings> {
        let url = self.supabase_url.clone().filter(|u| !u.trim().is_empty())?;
        let key = self.supabase_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(StoreSettings {
            url,
            key,
            table: self.weather_table_name.clone(),
        })
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_reading_entries: self.max_cache_entries,
            dedup_interval: Duration::from_secs(self.dedup_interval_secs),
        }
    }

    pub fn run_settings(&self, max_workers: usize) -> RunSettings {
        RunSettings {
            credentials: self.credentials(),
            fetch_days: self.fetch_days,
            max_workers,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_sync_config() -> anyhow::Result<SyncConfig> {
    build_sync_config(None)
}

/// `env` replaces the process environment, for tests.
fn build_sync_config(env: Option<HashMap<String, String>>) -> anyhow::Result<SyncConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sync").required(false))
        .add_source(config::Environment::default().try_parsing(true).source(env))
        .build()?;

    let config: SyncConfig = settings.try_deserialize()?;
    if config.fetch_days == 0 || config.fetch_days > MAX_FETCH_DAYS {
        anyhow::bail!(
            "fetch_days must be between 1 and {}, got {}",
            MAX_FETCH_DAYS,
            config.fetch_days
        );
    }
    Ok(config)
}
