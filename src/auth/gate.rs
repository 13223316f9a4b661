//! Authorization Gate
//! Mission: Turn credentials into tokens and tokens into checked identities

use crate::auth::account_store::AccountStore;
use crate::auth::models::{Account, IssuedToken, NewAccount, Principal, Role};
use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenIssuer;
use crate::error::ServiceError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for everything identity related
pub struct AuthGate {
    accounts: Arc<AccountStore>,
    tokens: Arc<TokenIssuer>,
    hasher: Arc<dyn PasswordHasher>,
    // Checked against when the username is unknown, so both failure paths do the same work
    decoy_hash: String,
}

impl AuthGate {
    pub fn new(
        accounts: Arc<AccountStore>,
        tokens: Arc<TokenIssuer>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, ServiceError> {
        let decoy_hash = hasher.hash("decoy-password-for-unknown-users")?;
        Ok(Self {
            accounts,
            tokens,
            hasher,
            decoy_hash,
        })
    }

    pub fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.tokens
    }

    pub fn register(&self, new_account: NewAccount) -> Result<Account, ServiceError> {
        self.accounts.register(new_account)
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<IssuedToken, ServiceError> {
        if username.is_empty() || password.is_empty() {
            return Err(ServiceError::invalid("username and password are required"));
        }

        let account = self.accounts.find_by_username(username);
        let verified = match &account {
            Some(account) => self.hasher.verify(password, &account.password_hash),
            None => {
                let _ = self.hasher.verify(password, &self.decoy_hash);
                false
            }
        };

        let Some(account) = account.filter(|_| verified) else {
            warn!("❌ Failed login attempt: {}", username);
            return Err(ServiceError::Unauthorized);
        };

        let issued = self.tokens.issue(&account)?;
        info!(
            "✅ Login successful: {} ({})",
            account.username,
            account.role.as_str()
        );
        Ok(issued)
    }

    /// Resolve a bearer token and check it against the role an operation needs.
    pub fn authorize(&self, token: Option<&str>, required: Role) -> Result<Principal, ServiceError> {
        let token = token.ok_or(ServiceError::Unauthorized)?;
        let principal = self.tokens.resolve(token)?;

        if !principal.role.satisfies(required) {
            debug!(
                "Forbidden: {} ({}) needs {}",
                principal.username, principal.role, required
            );
            return Err(ServiceError::Forbidden);
        }

        Ok(principal)
    }

    /// End the session behind a token.
    pub fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.tokens.revoke(token)
    }
}
