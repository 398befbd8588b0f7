//! Configuration management for the research binaries.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::data::{ExchangeConfig, RetryPolicy};
use crate::error::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    /// Root of the parquet bar cache
    pub cache_dir: PathBuf,
    pub server_addr: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            cache_dir: PathBuf::from("data/raw"),
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3040)),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, after reading `.env`
    /// if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take defaults; set
    /// but unparseable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", defaults.exchange.retry.max_attempts)?,
            base_delay: millis_or(&lookup, "RETRY_BASE_DELAY_MS", defaults.exchange.retry.base_delay)?,
            max_delay: millis_or(&lookup, "RETRY_MAX_DELAY_MS", defaults.exchange.retry.max_delay)?,
        };
        if retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            });
        }

        let exchange = ExchangeConfig {
            base_url: lookup("EXCHANGE_BASE_URL").unwrap_or(defaults.exchange.base_url),
            timeout: millis_or(&lookup, "EXCHANGE_TIMEOUT_MS", defaults.exchange.timeout)?,
            page_limit: parse_or(&lookup, "EXCHANGE_PAGE_LIMIT", defaults.exchange.page_limit)?,
            history_years: parse_or(&lookup, "EXCHANGE_HISTORY_YEARS", defaults.exchange.history_years)?,
            retry,
        };

        Ok(Self {
            exchange,
            cache_dir: lookup("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            server_addr: parse_or(&lookup, "SERVER_ADDR", defaults.server_addr)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| Error::Config {
            message: format!("{} has invalid value '{}'", key, raw),
        }),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse_or(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.exchange.base_url, "https://api.binance.us");
        assert_eq!(cfg.exchange.timeout, Duration::from_millis(4000));
        assert_eq!(cfg.exchange.page_limit, 730);
        assert_eq!(cfg.exchange.retry.max_attempts, 5);
        assert_eq!(cfg.cache_dir, PathBuf::from("data/raw"));
        assert_eq!(cfg.server_addr.port(), 3040);
    }

    #[test]
    fn test_overrides() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("EXCHANGE_BASE_URL", "http://localhost:9000"),
            ("RETRY_BASE_DELAY_MS", "10"),
            ("CACHE_DIR", "/tmp/bars"),
            ("SERVER_ADDR", "0.0.0.0:8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.exchange.base_url, "http://localhost:9000");
        assert_eq!(cfg.exchange.retry.base_delay, Duration::from_millis(10));
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/bars"));
        assert_eq!(cfg.server_addr.port(), 8080);
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("EXCHANGE_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("EXCHANGE_TIMEOUT_MS"));

        let err = AppConfig::from_lookup(lookup_from(&[("RETRY_MAX_ATTEMPTS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
