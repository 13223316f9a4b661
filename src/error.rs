//! Service Errors
//! Mission: One taxonomy for every failure the core can report

use crate::storage::StoreError;

/// Errors produced by the credential, token and item layers.
#[derive(Debug)]
pub enum ServiceError {
    /// Malformed or missing input. Always the caller's to fix.
    InvalidInput(String),
    /// Uniqueness violation.
    Conflict(String),
    /// Missing, invalid or expired credential. Deliberately carries no detail.
    Unauthorized,
    /// Valid identity, insufficient role.
    Forbidden,
    /// Referenced entity absent.
    NotFound(String),
    /// Persistence failed. Never retried.
    Storage(StoreError),
    /// The password hashing primitive failed.
    Hashing(String),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True for failures that are the server's fault rather than the caller's.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Hashing(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Storage(e) => write!(f, "Storage failure: {}", e),
            Self::Hashing(msg) => write!(f, "Password hashing failure: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}
