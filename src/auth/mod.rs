//! Authentication Module
//! Mission: Registered accounts, per-login bearer tokens, and role-gated access

pub mod account_store;
pub mod api;
pub mod gate;
pub mod middleware;
pub mod models;
pub mod password;
pub mod token;

pub use account_store::AccountStore;
pub use gate::AuthGate;
pub use middleware::{require_role, RoleGuard};
pub use models::{Account, Principal, Role};
pub use password::{BcryptHasher, PasswordHasher};
pub use token::TokenIssuer;
