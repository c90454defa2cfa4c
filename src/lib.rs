pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod notifications;
pub mod store;
pub mod utils;
