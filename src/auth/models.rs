//! Authentication Models
//! Mission: Define account, role and token data structures

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 64;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Stored account record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String, // bcrypt hash - persisted, never returned over HTTP
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account roles, ordered by privilege
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    #[serde(rename = "normal")]
    Normal, // Read access to items
    #[serde(rename = "admin")]
    Admin, // Everything a normal account can do, plus item writes
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Admin => "admin",
        }
    }

    /// Exact, lowercase role names only.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Role::Normal),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Whether an account holding `self` may perform an operation requiring `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated registration input. Only constructible through [`NewAccount::new`]
/// or [`NewAccount::parse`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    username: String,
    password: String,
    role: Role,
}

impl NewAccount {
    pub fn new(username: &str, password: &str, role: Role) -> Result<Self, ServiceError> {
        if username.trim().is_empty() {
            return Err(ServiceError::invalid("username is required"));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(ServiceError::invalid(format!(
                "username must be at most {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if password.is_empty() {
            return Err(ServiceError::invalid("password is required"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(ServiceError::invalid(format!(
                "password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            role,
        })
    }

    pub fn parse(request: RegisterRequest) -> Result<Self, ServiceError> {
        let (Some(username), Some(password), Some(role)) =
            (request.username, request.password, request.role)
        else {
            return Err(ServiceError::invalid(
                "username, password, and role are required",
            ));
        };

        let role = Role::parse(&role)
            .ok_or_else(|| ServiceError::invalid("role must be one of: normal, admin"))?;

        Self::new(&username, &password, role)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Persisted token record. The raw token value is never stored, only its keyed digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub digest: String,
    pub account_id: Uuid,
    pub role: Role, // snapshot at issuance
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A freshly issued bearer token, handed to the client once
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub account_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The identity behind an accepted bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role, // from the token, not the live account
    pub expires_at: DateTime<Utc>,
}

/// Registration request body. Fields are optional so that a missing field is
/// reported as invalid input rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Authentication request body
#[derive(Debug, Default, Deserialize)]
pub struct AuthenticateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Authentication response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64, // seconds until expiration
    pub role: Role,
}

impl AuthenticateResponse {
    pub fn from_issued(issued: IssuedToken) -> Self {
        let expires_in = (issued.expires_at - Utc::now()).num_seconds().max(0);
        Self {
            token: issued.value,
            token_type: "Bearer",
            expires_at: issued.expires_at,
            expires_in,
            role: issued.role,
        }
    }
}

/// Current session, as seen through the presented token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl SessionResponse {
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            account_id: principal.account_id,
            username: principal.username.clone(),
            role: principal.role,
            expires_at: principal.expires_at,
        }
    }
}

/// Account response (sanitized)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role,
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let admin = Role::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""admin""#);

        let normal: Role = serde_json::from_str(r#""normal""#).unwrap();
        assert_eq!(normal, Role::Normal);
    }

    #[test]
    fn test_role_string_conversion() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::Normal.as_str(), "normal");

        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("normal"), Some(Role::Normal));
        assert_eq!(Role::parse("NORMAL"), None);
        assert_eq!(Role::parse(" admin "), None);
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_admin_satisfies_normal_but_not_reverse() {
        assert!(Role::Admin.satisfies(Role::Normal));
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Normal.satisfies(Role::Normal));
        assert!(!Role::Normal.satisfies(Role::Admin));
    }

    #[test]
    fn test_registration_requires_every_field() {
        let missing_role = RegisterRequest {
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
            role: None,
        };
        assert!(matches!(
            NewAccount::parse(missing_role),
            Err(ServiceError::InvalidInput(_))
        ));

        let bad_role = RegisterRequest {
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
            role: Some("root".to_string()),
        };
        assert!(matches!(
            NewAccount::parse(bad_role),
            Err(ServiceError::InvalidInput(_))
        ));

        let ok = RegisterRequest {
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
            role: Some("admin".to_string()),
        };
        let parsed = NewAccount::parse(ok).unwrap();
        assert_eq!(parsed.username(), "alice");
        assert_eq!(parsed.role(), Role::Admin);
    }

    #[test]
    fn test_registration_rejects_blank_and_oversized_input() {
        assert!(NewAccount::new("   ", "pw", Role::Normal).is_err());
        assert!(NewAccount::new("bob", "", Role::Normal).is_err());
        assert!(NewAccount::new(&"x".repeat(MAX_USERNAME_CHARS + 1), "pw", Role::Normal).is_err());
        assert!(NewAccount::new("bob", &"p".repeat(MAX_PASSWORD_BYTES + 1), Role::Normal).is_err());
        assert!(NewAccount::new("bob", &"p".repeat(MAX_PASSWORD_BYTES), Role::Normal).is_ok());
    }

    #[test]
    fn test_account_response_omits_password_hash() {
        let account = Account {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::Normal,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(AccountResponse::from_account(&account)).unwrap();
        assert_eq!(json["username"], "testuser");
        assert_eq!(json["role"], "normal");
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
