// Library exports for testing
pub mod api;
pub mod config;
pub mod errors;
pub mod http_client;
pub mod metrics;
