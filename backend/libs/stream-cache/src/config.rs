/// Configuration for the cache layer
///
/// Loads configuration from environment variables.
use crate::error::{CacheError, CacheResult};
use std::time::Duration;
use tracing::{info, warn};

/// Deployment context; decides whether a missing remote store is fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    NonProduction,
}

impl DeploymentMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => DeploymentMode::Production,
            _ => DeploymentMode::NonProduction,
        }
    }
}

/// Remote store settings plus fallback housekeeping
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Force fallback mode regardless of the other remote settings
    pub disabled: bool,
    /// Full connection URL; wins over host/port when present
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub deployment: DeploymentMode,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Reconnect attempts per outage before relying on fallback
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff: Duration,
    pub max_reconnect_backoff: Duration,
    /// Period of the fallback store expiry sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            url: None,
            host: None,
            port: 6379,
            password: None,
            db: 0,
            deployment: DeploymentMode::NonProduction,
            connect_timeout: Duration::from_millis(5000),
            command_timeout: Duration::from_millis(3000),
            max_reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(100),
            max_reconnect_backoff: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Config that never touches the network
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Default::default()
        }
    }

    /// Config pointing at a single Redis host
    pub fn for_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// - `REDIS_DISABLED`: `true`/`1`/`yes`/`on` forces fallback mode
    /// - `REDIS_URL`: full connection URL
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`
    /// - `APP_ENV`: `production` makes a missing host fatal
    /// - `REDIS_CONNECT_TIMEOUT_MS`, `REDIS_COMMAND_TIMEOUT_MS`
    /// - `REDIS_MAX_RECONNECT_ATTEMPTS`, `REDIS_RECONNECT_BACKOFF_MS`
    /// - `CACHE_SWEEP_INTERVAL_SECS`
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            disabled: get("REDIS_DISABLED").map(|v| parse_flag(&v)).unwrap_or(false),
            url: get("REDIS_URL"),
            host: get("REDIS_HOST"),
            port: parse_or("REDIS_PORT", get("REDIS_PORT"), defaults.port)?,
            password: get("REDIS_PASSWORD"),
            db: parse_or("REDIS_DB", get("REDIS_DB"), defaults.db)?,
            deployment: get("APP_ENV")
                .map(|v| DeploymentMode::parse(&v))
                .unwrap_or(DeploymentMode::NonProduction),
            connect_timeout: Duration::from_millis(parse_or(
                "REDIS_CONNECT_TIMEOUT_MS",
                get("REDIS_CONNECT_TIMEOUT_MS"),
                defaults.connect_timeout.as_millis() as u64,
            )?),
            command_timeout: Duration::from_millis(parse_or(
                "REDIS_COMMAND_TIMEOUT_MS",
                get("REDIS_COMMAND_TIMEOUT_MS"),
                defaults.command_timeout.as_millis() as u64,
            )?),
            max_reconnect_attempts: parse_or(
                "REDIS_MAX_RECONNECT_ATTEMPTS",
                get("REDIS_MAX_RECONNECT_ATTEMPTS"),
                defaults.max_reconnect_attempts,
            )?,
            reconnect_backoff: Duration::from_millis(parse_or(
                "REDIS_RECONNECT_BACKOFF_MS",
                get("REDIS_RECONNECT_BACKOFF_MS"),
                defaults.reconnect_backoff.as_millis() as u64,
            )?),
            max_reconnect_backoff: defaults.max_reconnect_backoff,
            sweep_interval: Duration::from_secs(parse_positive(
                "CACHE_SWEEP_INTERVAL_SECS",
                get("CACHE_SWEEP_INTERVAL_SECS"),
                defaults.sweep_interval.as_secs(),
            )?),
        })
    }

    pub fn is_production(&self) -> bool {
        self.deployment == DeploymentMode::Production
    }

    /// Resolve the connection URL for the remote store.
    ///
    /// `Ok(None)` means the cache runs in fallback mode for the life of the
    /// process. Missing connection parameters are only an error in production.
    pub fn remote_url(&self) -> CacheResult<Option<String>> {
        if self.disabled {
            info!("Remote cache disabled by configuration, using in-memory store");
            return Ok(None);
        }

        if let Some(url) = &self.url {
            return Ok(Some(url.clone()));
        }

        match &self.host {
            Some(host) => {
                let auth = match &self.password {
                    Some(password) => format!(":{}@", urlencoding::encode(password)),
                    None => String::new(),
                };
                Ok(Some(format!(
                    "redis://{}{}:{}/{}",
                    auth, host, self.port, self.db
                )))
            }
            None if self.is_production() => Err(CacheError::Configuration(
                "REDIS_HOST (or REDIS_URL) must be set in production".to_string(),
            )),
            None => {
                warn!("REDIS_HOST not set, using in-memory cache store");
                Ok(None)
            }
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> CacheResult<T> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| CacheError::Configuration(format!("{} has invalid value {:?}", name, value))),
        None => Ok(default),
    }
}

fn parse_positive(name: &str, raw: Option<String>, default: u64) -> CacheResult<u64> {
    match parse_or(name, raw, default)? {
        0 => Err(CacheError::Configuration(format!("{} must be greater than zero", name))),
        value => Ok(value),
    }
}
