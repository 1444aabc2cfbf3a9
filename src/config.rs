//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `PORTAL_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string. Without it the portal
//!   runs on the in-memory store.
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `NATS_URL` - Message bus for order events. Events stay in-process without it.
//! - `PORTAL_BEST_SELLERS` - Comma-separated best-seller style codes
//! - `PORTAL_REFERENCE_ATTEMPTS` - Reference allocation attempts before
//!   giving up on write conflicts (default: 3)

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use crate::domain::aggregates::BestSellers;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub best_sellers: BestSellers,
    pub reference_attempts: u32,
}

impl PortalConfig {
    /// Load configuration from the process environment, reading `.env` first
    /// if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let reference_attempts = parse_or(&get, "PORTAL_REFERENCE_ATTEMPTS", 3u32)?;
        if reference_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar("PORTAL_REFERENCE_ATTEMPTS".into(), "must be at least 1".into()));
        }

        Ok(Self {
            host: parse_or(&get, "PORTAL_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&get, "PORT", 8083u16)?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            nats_url: get("NATS_URL"),
            best_sellers: BestSellers::new(get("PORTAL_BEST_SELLERS").unwrap_or_default().split(',').filter(|s| !s.trim().is_empty())),
            reference_attempts,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
