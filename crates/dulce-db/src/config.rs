//! Ledger configuration module.
//!
//! Configuration is loaded from `DULCE_*` environment variables with fallback
//! to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dulce_core::TransferPolicy;

use crate::ledger::RetryPolicy;
use crate::pool::DbConfig;

/// Ledger service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size (default: 5)
    pub max_connections: u32,

    /// How long a writer waits on a locked database, in seconds
    pub busy_timeout_secs: u64,

    /// Extra attempts after a lost optimistic race (default: 3)
    pub transfer_retry_limit: u32,

    /// First pause before a retry, in milliseconds; doubles per attempt
    pub retry_initial_backoff_ms: u64,

    /// Longest pause between retries, in milliseconds
    pub retry_max_backoff_ms: u64,

    /// Let a transfer credit another row of the origin seller
    pub allow_same_seller: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("dulce.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
            transfer_retry_limit: 3,
            retry_initial_backoff_ms: 10,
            retry_max_backoff_ms: 500,
            allow_same_seller: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            database_path: lookup("DULCE_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "DULCE_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_secs: parse_or(
                &lookup,
                "DULCE_BUSY_TIMEOUT_SECS",
                defaults.busy_timeout_secs,
            )?,

            transfer_retry_limit: parse_or(
                &lookup,
                "DULCE_TRANSFER_RETRY_LIMIT",
                defaults.transfer_retry_limit,
            )?,

            retry_initial_backoff_ms: parse_or(
                &lookup,
                "DULCE_RETRY_INITIAL_BACKOFF_MS",
                defaults.retry_initial_backoff_ms,
            )?,

            retry_max_backoff_ms: parse_or(
                &lookup,
                "DULCE_RETRY_MAX_BACKOFF_MS",
                defaults.retry_max_backoff_ms,
            )?,

            allow_same_seller: parse_or(
                &lookup,
                "DULCE_ALLOW_SAME_SELLER",
                defaults.allow_same_seller,
            )?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DULCE_MAX_CONNECTIONS".to_string()));
        }

        if config.retry_max_backoff_ms < config.retry_initial_backoff_ms {
            return Err(ConfigError::InvalidValue("DULCE_RETRY_MAX_BACKOFF_MS".to_string()));
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            limit: self.transfer_retry_limit,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
        }
    }

    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            allow_same_seller: self.allow_same_seller,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
