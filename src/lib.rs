pub mod auth;
pub mod config;
pub mod content;
pub mod discussion;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod openapi;
pub mod policy;
pub mod query;
pub mod repo;
pub mod routes;
pub mod security;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
