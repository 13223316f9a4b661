//! HTTP API
//!
//! Handlers live next to the domain they serve (`auth::api`, `items::api`);
//! this module holds what they share.

pub mod error;

pub use error::ApiError;

/// Liveness check - GET /health
pub async fn health_check() -> &'static str {
    "catalog-backend operational"
}
