//! Onsite Atlas common library
//!
//! Shared by the gateway and the portal/admin client:
//! - Abstract domain model, review state machine and validation
//! - Reviewer assignment rules
//! - List filtering/pagination and export filters
//! - Response envelope, error types and handling
//! - Configuration, authentication, metrics
//! - Storage trait with Postgres and in-memory implementations

pub mod abstracts;
pub mod auth;
pub mod config;
pub mod db;
pub mod envelope;
pub mod errors;
pub mod export;
pub mod listing;
pub mod metrics;
pub mod store;

pub use config::AppConfig;
pub use envelope::ApiEnvelope;
pub use errors::{AppError, Result};
pub use store::{AbstractStore, InMemoryStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
