//! micropost - post service and API gateway
//!
//! A read-through cache in front of the post record store, and fixed-window /
//! token-bucket admission control, both backed by a shared counter store.

pub mod admission;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod records;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::{Config, ServiceRole};
pub use gateway::GatewayState;
pub use tasks::spawn_cleanup_task;
