//! Runtime configuration, read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use mixbook_observability::LogFormat;

use crate::store::StorageLocation;

pub const BIND_ADDR: &str = "MIXBOOK_BIND_ADDR";
pub const DATABASE_PATH: &str = "MIXBOOK_DATABASE_PATH";
pub const ID_LENGTH: &str = "MIXBOOK_ID_LENGTH";
pub const SEARCH_REBUILD_SECS: &str = "MIXBOOK_SEARCH_REBUILD_SECS";
pub const LOG_FORMAT: &str = "MIXBOOK_LOG_FORMAT";
pub const JWT_SECRET: &str = "JWT_SECRET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ID_LENGTH: usize = 5;
const DEFAULT_SEARCH_REBUILD_SECS: u64 = 600;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, reason: impl Into<String>) -> Self {
        Self {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage: StorageLocation,
    pub id_length: usize,
    pub search_rebuild_interval: Duration,
    pub log_format: LogFormat,
    pub jwt_secret: String,
}

impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("storage", &self.storage)
            .field("id_length", &self.id_length)
            .field("search_rebuild_interval", &self.search_rebuild_interval)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source; unset or blank means default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = get(BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::new(BIND_ADDR, e.to_string()))?;

        let storage = get(DATABASE_PATH)
            .map(|raw| StorageLocation::parse(&raw))
            .unwrap_or(StorageLocation::InMemory);

        let id_length = positive(ID_LENGTH, get(ID_LENGTH), DEFAULT_ID_LENGTH as u64)? as usize;
        let rebuild_secs = positive(SEARCH_REBUILD_SECS, get(SEARCH_REBUILD_SECS), DEFAULT_SEARCH_REBUILD_SECS)?;

        let log_format = match get(LOG_FORMAT) {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::new(LOG_FORMAT, e.to_string()))?,
            None => LogFormat::default(),
        };

        let jwt_secret = get(JWT_SECRET).unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        Ok(Self {
            bind_addr,
            storage,
            id_length,
            search_rebuild_interval: Duration::from_secs(rebuild_secs),
            log_format,
            jwt_secret,
        })
    }

    /// True when no `JWT_SECRET` was supplied.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn positive(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::new(var, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::new(var, e.to_string())),
    }
}
