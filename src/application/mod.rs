// Application layer - Sync pipeline use cases and ports
pub mod cache;
pub mod dedup;
pub mod error;
pub mod fetch_orchestrator;
pub mod persister;
pub mod record_store;
pub mod remote_client;
pub mod sync_service;
pub mod telemetry_api;
pub mod transformer;
