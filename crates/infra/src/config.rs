//! Configuration loading and representation.

use std::collections::HashMap;

use thiserror::Error;

use freshcart_observability::LogFormat;

use crate::ledger::DEFAULT_MAX_CONFLICT_RETRIES;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const LOG_FORMAT: &str = "FRESHCART_LOG_FORMAT";
pub const DB_MAX_CONNECTIONS: &str = "FRESHCART_DB_MAX_CONNECTIONS";
pub const MAX_CONFLICT_RETRIES: &str = "FRESHCART_MAX_CONFLICT_RETRIES";

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres connection string. Blank counts as unset.
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub db_max_connections: u32,
    pub max_conflict_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_format: LogFormat::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match get(LOG_FORMAT) {
            Some(v) => v.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                var: LOG_FORMAT,
                reason: e.to_string(),
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            database_url: get(DATABASE_URL),
            log_format,
            db_max_connections: parse_positive(DB_MAX_CONNECTIONS, get(DB_MAX_CONNECTIONS))?
                .unwrap_or(defaults.db_max_connections),
            max_conflict_retries: parse_u32(MAX_CONFLICT_RETRIES, get(MAX_CONFLICT_RETRIES))?
                .unwrap_or(defaults.max_conflict_retries),
        })
    }
}

fn parse_u32(var: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("'{v}': {e}"),
            })
        })
        .transpose()
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    match parse_u32(var, value)? {
        Some(0) => Err(ConfigError::Invalid {
            var,
            reason: "must be at least 1".to_string(),
        }),
        other => Ok(other),
    }
}
