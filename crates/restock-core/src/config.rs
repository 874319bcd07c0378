//! Config - 環境変数からの設定読み込み
//!
//! | 変数 | デフォルト |
//! |------|-----------|
//! | `RESTOCK_QUEUE_CAPACITY` | 100 |
//! | `RESTOCK_REFRESH_SECS` | 60 |
//! | `RESTOCK_FETCH_MAX_ATTEMPTS` | 5 |
//! | `RESTOCK_FETCH_BASE_DELAY_MS` | 2000 |
//! | `RESTOCK_FETCH_BACKOFF_MULTIPLIER` | 2.0 |
//! | `RESTOCK_PRODUCT_CACHE_SECS` | 0（キャッシュなし） |

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::queue::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

impl ConfigError {
    fn parse(key: &str, details: impl Display) -> Self {
        ConfigError::ParseError {
            key: key.to_string(),
            details: details.to_string(),
        }
    }
}

/// `APP_ENV`. production なら JSON ログ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_or_default(key, default)
        .trim()
        .parse()
        .map_err(|e| ConfigError::parse(key, e))
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Dispatch queue bound. At least 1.
    pub queue_capacity: usize,
    /// Sleep between cycles.
    pub refresh_interval: Duration,
    pub fetch_max_attempts: u32,
    pub fetch_base_delay: Duration,
    pub fetch_backoff_multiplier: f64,
    /// `None` disables the product cache.
    pub product_cache_ttl: Option<Duration>,
}

impl ServiceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_max_attempts,
            self.fetch_base_delay,
            self.fetch_backoff_multiplier,
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            refresh_interval: Duration::from_secs(60),
            fetch_max_attempts: 5,
            fetch_base_delay: Duration::from_millis(2000),
            fetch_backoff_multiplier: 2.0,
            product_cache_ttl: None,
        }
    }
}

impl FromEnv for ServiceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let queue_capacity: usize = env_parse("RESTOCK_QUEUE_CAPACITY", "100")?;
        if queue_capacity == 0 {
            return Err(ConfigError::parse("RESTOCK_QUEUE_CAPACITY", "must be at least 1"));
        }

        let refresh_secs: u64 = env_parse("RESTOCK_REFRESH_SECS", "60")?;

        let fetch_max_attempts: u32 = env_parse("RESTOCK_FETCH_MAX_ATTEMPTS", "5")?;
        if fetch_max_attempts == 0 {
            return Err(ConfigError::parse(
                "RESTOCK_FETCH_MAX_ATTEMPTS",
                "must be at least 1",
            ));
        }

        let base_delay_ms: u64 = env_parse("RESTOCK_FETCH_BASE_DELAY_MS", "2000")?;

        let fetch_backoff_multiplier: f64 = env_parse("RESTOCK_FETCH_BACKOFF_MULTIPLIER", "2.0")?;
        if !(fetch_backoff_multiplier >= 1.0 && fetch_backoff_multiplier.is_finite()) {
            return Err(ConfigError::parse(
                "RESTOCK_FETCH_BACKOFF_MULTIPLIER",
                "must be a finite number >= 1.0",
            ));
        }

        let cache_secs: u64 = env_parse("RESTOCK_PRODUCT_CACHE_SECS", "0")?;
        let product_cache_ttl = (cache_secs > 0).then(|| Duration::from_secs(cache_secs));

        Ok(Self {
            queue_capacity,
            refresh_interval: Duration::from_secs(refresh_secs),
            fetch_max_attempts,
            fetch_base_delay: Duration::from_millis(base_delay_ms),
            fetch_backoff_multiplier,
            product_cache_ttl,
        })
    }
}
