//! # Configuration Module
//!
//! Loads and validates configuration from environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATABASE_URL` | PostgreSQL connection string | required |
//! | `ARCHIVE_SECRET` | Secret the archive key is derived from | required |
//! | `SWEEP_INTERVAL_SECS` | Auto-close sweep period | `60` |
//! | `SWEEP_BATCH_LIMIT` | Max tenders closed per sweep run | `100` |
//! | `ARCHIVE_RETENTION_YEARS` | Default archive retention horizon | `7` |
//! | `ARCHIVE_EXPIRY_INTERVAL_SECS` | Archive expiry sweep period | `3600` |

use std::env;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is missing
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Failed to parse a value
    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

/// Application configuration loaded from environment variables.
///
/// Use `dotenvy::dotenv()` before calling [`AppConfig::from_env`] to
/// pick up a `.env` file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Secret the archive encryption key is derived from (Argon2id).
    /// Must not be empty.
    pub archive_secret: String,

    /// How often the auto-close sweep runs, in seconds.
    pub sweep_interval_secs: u64,

    /// Upper bound on tenders processed per sweep run. A larger
    /// backlog drains across successive runs.
    pub sweep_batch_limit: i64,

    /// Default retention horizon for archive records, in years.
    pub archive_retention_years: u32,

    /// How often overdue archives are flipped to expired, in seconds.
    pub archive_expiry_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let archive_secret = get_env("ARCHIVE_SECRET")?;
        if archive_secret.trim().is_empty() {
            return Err(ConfigError::ParseError(
                "ARCHIVE_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            archive_secret,
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS", "60")?,
            sweep_batch_limit: parse_env("SWEEP_BATCH_LIMIT", "100")?,
            archive_retention_years: parse_env("ARCHIVE_RETENTION_YEARS", "7")?,
            archive_expiry_interval_secs: parse_env("ARCHIVE_EXPIRY_INTERVAL_SECS", "3600")?,
        })
    }
}

/// Get a required environment variable.
fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default, parsed into `T`.
fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e: T::Err| ConfigError::ParseError(key.to_string(), e.to_string()))
}
