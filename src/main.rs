// Main entry point - Configuration, wiring and one sync run
mod application;
mod domain;
mod infrastructure;

use std::sync::Arc;

use anyhow::Context;

use crate::application::fetch_orchestrator::effective_workers;
use crate::application::persister::BulkPersister;
use crate::application::remote_client::RemoteDataClient;
use crate::application::sync_service::{RunState, SyncService};
use crate::infrastructure::config::load_sync_config;
use crate::infrastructure::logging::init_tracing;
use crate::infrastructure::mertani_api::MertaniApi;
use crate::infrastructure::supabase_store::SupabaseStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_sync_config().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(config.github_actions);
    tracing::debug!("Starting rainfall sync");

    // Telemetry side
    let api = Arc::new(
        MertaniApi::new(
            &config.mertani_base_url,
            config.devices_limit,
            config.request_timeout(),
        )
        .context("Failed to build telemetry HTTP client")?,
    );
    let client = Arc::new(RemoteDataClient::new(api, config.cache_settings()));

    // Destination side (optional)
    let persister = match config.store_settings() {
        Some(settings) => {
            let store = SupabaseStore::new(settings, config.request_timeout())
                .context("Failed to build store HTTP client")?;
            Some(BulkPersister::new(Arc::new(store), config.batch_size))
        }
        None => None,
    };

    let workers = effective_workers(config.max_workers, config.github_actions);
    let mut service = SyncService::new(client, persister, config.run_settings(workers));

    let report = service.run().await.context("Sync run failed")?;
    tracing::debug!(
        state = ?service.state(),
        rows_saved = report.summary.rows_saved,
        "Run finished"
    );
    if report.state == RunState::Failed {
        // Missing credentials or a rejected login end the run without an error exit.
        if let Some(reason) = &report.failure {
            tracing::warn!("Nothing synced: {}", reason);
        }
    }

    Ok(())
}
