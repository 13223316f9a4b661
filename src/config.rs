//! Service Configuration
//!
//! Every setting can come from a command-line flag or a `CATALOG_*`
//! environment variable (`.env` is loaded before parsing).

use crate::auth::{password::BcryptHasher, token};
use crate::middleware::RateLimitConfig;
use crate::server::ServiceSettings;
use crate::storage::{SqliteDatabase, StorageProvider};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Where collections are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// accounts.json, items.json and tokens.json inside the data directory
    Json,
    /// catalog.db inside the data directory
    Sqlite,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "catalog")]
#[command(about = "Item catalog service with token authentication")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "CATALOG_BIND_ADDR", default_value = "0.0.0.0:3001")]
    pub bind_addr: SocketAddr,

    /// Directory holding the persisted collections
    #[arg(long, env = "CATALOG_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Storage backend
    #[arg(long, env = "CATALOG_STORAGE", value_enum, default_value = "json")]
    pub storage: StorageKind,

    /// Key for token digests (at least 32 bytes). Random per process when unset.
    #[arg(long, env = "CATALOG_TOKEN_KEY", hide_env_values = true)]
    pub token_key: Option<String>,

    /// Token lifetime in hours
    #[arg(long, env = "CATALOG_TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// Seconds between expired-token sweeps (0 disables the sweep)
    #[arg(long, env = "CATALOG_TOKEN_SWEEP_SECS", default_value_t = 300)]
    pub token_sweep_secs: u64,

    /// bcrypt work factor
    #[arg(long, env = "CATALOG_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Credential requests allowed per client IP per minute
    #[arg(long, env = "CATALOG_AUTH_RATE_LIMIT", default_value_t = 20)]
    pub auth_rate_limit: u32,

    /// Extra credential requests tolerated above the limit
    #[arg(long, env = "CATALOG_AUTH_RATE_BURST", default_value_t = 5)]
    pub auth_rate_burst: u32,

    /// Admin account created at startup if no admin exists
    #[arg(long, env = "CATALOG_ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "CATALOG_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl Config {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=token::MAX_TTL_HOURS).contains(&self.token_ttl_hours) {
            bail!(
                "CATALOG_TOKEN_TTL_HOURS must be between 1 and {}",
                token::MAX_TTL_HOURS
            );
        }
        if !(BcryptHasher::MIN_COST..=BcryptHasher::MAX_COST).contains(&self.bcrypt_cost) {
            bail!(
                "CATALOG_BCRYPT_COST must be between {} and {}",
                BcryptHasher::MIN_COST,
                BcryptHasher::MAX_COST
            );
        }
        if self.auth_rate_limit == 0 {
            bail!("CATALOG_AUTH_RATE_LIMIT must be at least 1");
        }
        if let Some(key) = &self.token_key {
            if key.len() < token::MIN_KEY_BYTES {
                bail!(
                    "CATALOG_TOKEN_KEY must be at least {} bytes",
                    token::MIN_KEY_BYTES
                );
            }
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            bail!("CATALOG_ADMIN_USERNAME and CATALOG_ADMIN_PASSWORD must be set together");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        if !(1..=token::MAX_TTL_HOURS).contains(&self.token_ttl_hours) {
            bail!("token lifetime of {}h is out of range", self.token_ttl_hours);
        }
        Ok(chrono::Duration::hours(self.token_ttl_hours))
    }

    pub fn token_sweep_interval(&self) -> Option<Duration> {
        (self.token_sweep_secs > 0).then(|| Duration::from_secs(self.token_sweep_secs))
    }

    /// Configured key bytes, or a fresh random key when none was given
    pub fn token_key_bytes(&self) -> Vec<u8> {
        match &self.token_key {
            Some(key) => key.as_bytes().to_vec(),
            None => {
                warn!("⚠️  CATALOG_TOKEN_KEY not set - using a random key, tokens will not survive a restart");
                token::generate_key()
            }
        }
    }

    pub fn service_settings(&self) -> Result<ServiceSettings> {
        Ok(ServiceSettings {
            token_key: self.token_key_bytes(),
            token_ttl: self.token_ttl()?,
            bcrypt_cost: self.bcrypt_cost,
        })
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.auth_rate_limit,
            window: Duration::from_secs(60),
            burst: self.auth_rate_burst,
        }
    }

    /// Create the data directory and open the configured backend family
    pub fn open_storage(&self) -> Result<StorageProvider> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;

        let provider = match self.storage {
            StorageKind::Json => StorageProvider::JsonFiles(self.data_dir.clone()),
            StorageKind::Sqlite => {
                let path = self.data_dir.join("catalog.db");
                let db = SqliteDatabase::open(&path)
                    .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
                StorageProvider::Sqlite(db)
            }
        };

        info!(
            "💾 Storage: {:?} in {}",
            self.storage,
            self.data_dir.display()
        );
        Ok(provider)
    }
}
