use canopy_common::error::{CanopyError, CanopyResult};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: String,
    /// Seconds after which a held sync lease is considered stale and may be
    /// taken over by a new run.
    pub lease_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> CanopyResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            database_max_connections: get_var_or("DATABASE_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|e| {
                    CanopyError::Config(format!("invalid DATABASE_MAX_CONNECTIONS: {e}"))
                })?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            lease_timeout_secs: get_var_or("SYNC_LEASE_TIMEOUT_SECS", "900")
                .parse()
                .map_err(|e| {
                    CanopyError::Config(format!("invalid SYNC_LEASE_TIMEOUT_SECS: {e}"))
                })?,
        })
    }
}

fn get_var(key: &str) -> CanopyResult<String> {
    env::var(key).map_err(|_| CanopyError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
