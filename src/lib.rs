//! Catalog Backend Library
//!
//! Item catalog service: account registration, bearer-token sessions and
//! role-gated item CRUD over snapshot-persisted collections.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod items;
pub mod middleware;
pub mod server;
pub mod storage;

pub use config::Config;
pub use server::{build_router, AppState, ServiceSettings};
