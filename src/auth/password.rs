//! Password Hashing
//! Mission: Keep raw passwords out of storage

use crate::error::ServiceError;
use tracing::warn;

/// One-way password hashing capability.
pub trait PasswordHasher: Send + Sync {
    /// Salted, deliberately slow hash of `raw`.
    fn hash(&self, raw: &str) -> Result<String, ServiceError>;

    /// Constant-time check of `raw` against a stored hash. A malformed hash never matches.
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

/// bcrypt with a tunable work factor
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub const MIN_COST: u32 = 4;
    pub const MAX_COST: u32 = 31;

    pub fn new(cost: u32) -> Result<Self, ServiceError> {
        if !(Self::MIN_COST..=Self::MAX_COST).contains(&cost) {
            return Err(ServiceError::invalid(format!(
                "bcrypt cost must be between {} and {}",
                Self::MIN_COST,
                Self::MAX_COST
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, raw: &str) -> Result<String, ServiceError> {
        bcrypt::hash(raw, self.cost).map_err(|e| ServiceError::Hashing(e.to_string()))
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        match bcrypt::verify(raw, hash) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Stored password hash could not be checked: {}", e);
                false
            }
        }
    }
}
