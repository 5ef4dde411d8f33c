// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod logging;
pub mod mertani_api;
pub mod supabase_store;
