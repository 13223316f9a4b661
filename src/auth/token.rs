//! Bearer Token Issuer
//! Mission: Issue, resolve and revoke opaque session tokens

use crate::auth::account_store::AccountStore;
use crate::auth::models::{Account, IssuedToken, Principal, TokenRecord};
use crate::error::ServiceError;
use crate::storage::{SnapshotBackend, SnapshotStore};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token; the wire form is twice as many hex characters.
const TOKEN_BYTES: usize = 32;

/// Shortest accepted token key, in bytes.
pub const MIN_KEY_BYTES: usize = 32;

/// Longest accepted token lifetime, in hours (one year).
pub const MAX_TTL_HOURS: i64 = 8760;

/// Token issuer backed by a snapshot collection.
///
/// Token values are random and carry no data. Records are keyed by an
/// HMAC-SHA256 digest of the value under the configured key, so the token file
/// alone is not enough to impersonate anyone.
pub struct TokenIssuer {
    tokens: SnapshotStore<TokenRecord>,
    accounts: Arc<AccountStore>,
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn open(
        backend: Box<dyn SnapshotBackend<TokenRecord>>,
        accounts: Arc<AccountStore>,
        key: &[u8],
        ttl: Duration,
    ) -> Result<Self, ServiceError> {
        if key.len() < MIN_KEY_BYTES {
            return Err(ServiceError::invalid(format!(
                "token key must be at least {} bytes",
                MIN_KEY_BYTES
            )));
        }
        if ttl <= Duration::zero() || ttl > Duration::hours(MAX_TTL_HOURS) {
            return Err(ServiceError::invalid(format!(
                "token lifetime must be positive and at most {} hours",
                MAX_TTL_HOURS
            )));
        }

        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| ServiceError::invalid(format!("token key rejected: {}", e)))?;

        Ok(Self {
            tokens: SnapshotStore::open("tokens", backend)?,
            accounts,
            mac,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for an account, snapshotting its current role.
    pub fn issue(&self, account: &Account) -> Result<IssuedToken, ServiceError> {
        self.issue_at(account, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, ServiceError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| ServiceError::invalid("token expiry is out of range"))?;

        let value = generate_value();
        let record = TokenRecord {
            digest: self.digest(&value),
            account_id: account.id,
            role: account.role,
            issued_at: now,
            expires_at,
        };

        self.tokens.transact(|txn| {
            txn.records_mut().push(record.clone());
            Ok::<_, ServiceError>(())
        })?;

        debug!(
            "Issued token for {} ({}), expires {}",
            account.username,
            account.id,
            record.expires_at.to_rfc3339()
        );

        Ok(IssuedToken {
            value,
            account_id: record.account_id,
            role: record.role,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        })
    }

    /// Resolve a token to the identity it was issued for.
    ///
    /// Missing, malformed, unknown and expired tokens all fail the same way.
    /// Only reads the collection; expired records are left to [`purge_expired`](Self::purge_expired).
    pub fn resolve(&self, value: &str) -> Result<Principal, ServiceError> {
        self.resolve_at(value, Utc::now())
    }

    pub(crate) fn resolve_at(&self, value: &str, now: DateTime<Utc>) -> Result<Principal, ServiceError> {
        if !is_well_formed(value) {
            return Err(ServiceError::Unauthorized);
        }
        let digest = self.digest(value);

        let record = self
            .tokens
            .read(|tokens| tokens.iter().find(|t| t.digest == digest).cloned())
            .ok_or(ServiceError::Unauthorized)?;

        if record.is_expired_at(now) {
            debug!("Rejected expired token for account {}", record.account_id);
            return Err(ServiceError::Unauthorized);
        }

        let account = self
            .accounts
            .find_by_id(&record.account_id)
            .ok_or(ServiceError::Unauthorized)?;

        Ok(Principal {
            account_id: account.id,
            username: account.username,
            role: record.role,
            expires_at: record.expires_at,
        })
    }

    /// Revoke a token. Unknown and malformed tokens are ignored.
    pub fn revoke(&self, value: &str) -> Result<(), ServiceError> {
        if !is_well_formed(value) {
            return Ok(());
        }
        if self.remove(&self.digest(value))? {
            debug!("Revoked token");
        }
        Ok(())
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ServiceError> {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let removed = self.tokens.transact(|txn| {
            let expired = txn.records().iter().filter(|t| t.is_expired_at(now)).count();
            if expired > 0 {
                txn.records_mut().retain(|t| !t.is_expired_at(now));
            }
            Ok::<_, ServiceError>(expired)
        })?;

        if removed > 0 {
            info!("🧹 Purged {} expired tokens", removed);
        }
        Ok(removed)
    }

    pub fn active_count(&self) -> usize {
        self.tokens.len()
    }

    fn remove(&self, digest: &str) -> Result<bool, ServiceError> {
        self.tokens.transact(|txn| {
            let Some(index) = txn.records().iter().position(|t| t.digest == digest) else {
                return Ok(false);
            };
            txn.records_mut().remove(index);
            Ok(true)
        })
    }

    fn digest(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn generate_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(value: &str) -> bool {
    value.len() == TOKEN_BYTES * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Fresh random key for processes started without a configured one.
pub fn generate_key() -> Vec<u8> {
    let mut key = vec![0u8; MIN_KEY_BYTES];
    OsRng.fill_bytes(&mut key);
    key
}
