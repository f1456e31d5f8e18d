// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod discovery_client;
pub mod json_state_store;
pub mod sonnen_client;
