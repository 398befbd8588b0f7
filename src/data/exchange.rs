//! Exchange REST client for historical klines and market listings.
//!
//! The client is an owned value: construct it from an [`ExchangeConfig`],
//! pass it to whatever needs it, and call [`ExchangeClient::close`] when
//! done. Several clients with different endpoints or retry policies can
//! coexist.
//!
//! Transient failures (timeouts, connection errors, HTTP 429 and 5xx) are
//! retried with exponential backoff up to `RetryPolicy::max_attempts`;
//! anything else fails on the first attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::types::{Bar, BarTable};
use crate::error::{Error, Result};

/// Default REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.us";

/// Two years of daily bars per page.
pub const DEFAULT_PAGE_LIMIT: usize = 365 * 2;

/// Universe used when the market listing cannot be fetched.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "BTC/USDT",
    "ETH/USDT",
    "BNB/USDT",
    "XRP/USDT",
    "ADA/USDT",
    "SOL/USDT",
    "DOGE/USDT",
];

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Sleep before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

/// Connection settings for one exchange endpoint.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub page_limit: usize,
    /// Look-back used when no `since` is given.
    pub history_years: i64,
    pub retry: RetryPolicy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(4000),
            page_limit: DEFAULT_PAGE_LIMIT,
            history_years: 10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<MarketInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    #[serde(default)]
    quote_volume: Option<String>,
}

/// What a single attempt produced.
enum Attempt<T> {
    Done(T),
    Transient(String),
}

/// Exchange REST client.
pub struct ExchangeClient {
    client: Client,
    config: ExchangeConfig,
    request_count: AtomicU64,
}

impl ExchangeClient {
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            request_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Requests sent so far, retries included.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Release the underlying connection pool.
    pub fn close(self) {
        debug!(
            base_url = %self.config.base_url,
            requests = self.request_count(),
            "closing exchange client"
        );
    }

    async fn try_once<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Attempt<T>> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let response = match self.client.get(url).query(params).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Ok(Attempt::Transient(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Ok(Attempt::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status: status.as_u16(), message });
        }

        match response.json::<T>().await {
            Ok(body) => Ok(Attempt::Done(body)),
            Err(e) if e.is_timeout() => Ok(Attempt::Transient(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// GET `path` with bounded retry on transient failures.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.try_once(&url, params).await? {
                Attempt::Done(body) => return Ok(body),
                Attempt::Transient(reason) if attempt < max_attempts => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        path,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient exchange error: {}, retrying",
                        reason
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Attempt::Transient(reason) => {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        last_error: reason,
                    });
                }
            }
        }
    }

    /// Fetch OHLCV history, paging forward from `since` until a short page.
    ///
    /// `since` defaults to `history_years` before now; `limit` defaults to
    /// the configured page size.
    pub async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<BarTable> {
        let limit = limit.unwrap_or(self.config.page_limit).max(1);
        let mut since_ms = match since {
            Some(ts) => ts.timestamp_millis(),
            None => {
                (Utc::now() - chrono::Duration::days(365 * self.config.history_years)).timestamp_millis()
            }
        };
        let venue = venue_symbol(symbol);
        let mut bars: Vec<Bar> = Vec::new();

        loop {
            let params = [
                ("symbol", venue.clone()),
                ("interval", timeframe.to_string()),
                ("startTime", since_ms.to_string()),
                ("limit", limit.to_string()),
            ];
            let rows: Vec<Vec<Value>> = self.get_json("/api/v3/klines", &params).await?;
            let page_len = rows.len();
            let page: Vec<Bar> = rows.iter().filter_map(|row| parse_kline(row)).collect();
            debug!(symbol, timeframe, since_ms, rows = page_len, "fetched kline page");

            let last_ts = page.last().map(|b| b.timestamp.timestamp_millis());
            bars.extend(page);

            if page_len < limit {
                break;
            }
            match last_ts {
                Some(ts) if ts >= since_ms => since_ms = ts + 1,
                _ => break,
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        info!(symbol, timeframe, bars = bars.len(), "fetched history");
        Ok(BarTable::from_bars(&bars))
    }

    /// Active `quote` markets ranked by 24h quote volume, best first.
    pub async fn markets_by_volume(&self, quote: &str) -> Result<Vec<String>> {
        let info: ExchangeInfo = self.get_json("/api/v3/exchangeInfo", &[]).await?;
        let tickers: Vec<Ticker24h> = self.get_json("/api/v3/ticker/24hr", &[]).await?;

        let volumes: HashMap<String, f64> = tickers
            .into_iter()
            .map(|t| {
                let v = t.quote_volume.and_then(|s| s.parse().ok()).unwrap_or(0.0);
                (t.symbol, v)
            })
            .collect();

        let mut ranked: Vec<(String, f64)> = info
            .symbols
            .into_iter()
            .filter(|m| m.status == "TRADING" && m.quote_asset == quote)
            .map(|m| {
                let v = volumes.get(&m.symbol).copied().unwrap_or(0.0);
                (format!("{}/{}", m.base_asset, m.quote_asset), v)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked.into_iter().map(|(s, _)| s).collect())
    }

    /// Top `n` symbols by quote volume, or the default list on any error.
    pub async fn top_symbols(&self, n: usize, quote: &str) -> Vec<String> {
        match self.markets_by_volume(quote).await {
            Ok(mut symbols) => {
                symbols.truncate(n);
                symbols
            }
            Err(e) => {
                warn!(quote, "market listing failed ({}), using default universe", e);
                default_symbols(n, quote)
            }
        }
    }
}

/// `"BTC/USDT"` -> `"BTCUSDT"`
pub fn venue_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

/// The fallback universe for `quote`, truncated to `n`.
pub fn default_symbols(n: usize, quote: &str) -> Vec<String> {
    DEFAULT_SYMBOLS
        .iter()
        .take(n)
        .map(|s| match s.split_once('/') {
            Some((base, _)) => format!("{}/{}", base, quote),
            None => s.to_string(),
        })
        .collect()
}

fn numeric_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Parse `[open_time_ms, open, high, low, close, volume, ...]`.
///
/// Malformed price fields become NaN; a row without a usable open time is
/// dropped.
pub fn parse_kline(row: &[Value]) -> Option<Bar> {
    let ts = match row.first()? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(Bar {
        timestamp: DateTime::from_timestamp_millis(ts)?,
        open: numeric_field(row.get(1)),
        high: numeric_field(row.get(2)),
        low: numeric_field(row.get(3)),
        close: numeric_field(row.get(4)),
        volume: numeric_field(row.get(5)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_venue_symbol() {
        assert_eq!(venue_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(venue_symbol("ethusdt"), "ETHUSDT");
    }

    #[test]
    fn test_default_symbols() {
        assert_eq!(default_symbols(2, "USDT"), vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(default_symbols(1, "USD"), vec!["BTC/USD"]);
        assert_eq!(default_symbols(100, "USDT").len(), DEFAULT_SYMBOLS.len());
    }

    #[test]
    fn test_parse_kline() {
        let row = vec![
            json!(1_704_067_200_000_i64),
            json!("42000.5"),
            json!("42500"),
            json!("41000"),
            json!("42200.25"),
            json!("1234.5"),
            json!(1_704_153_599_999_i64),
        ];
        let bar = parse_kline(&row).unwrap();
        assert_eq!(bar.timestamp.timestamp_millis(), 1_704_067_200_000);
        assert_eq!(bar.open, 42000.5);
        assert_eq!(bar.close, 42200.25);
        assert_eq!(bar.volume, 1234.5);
    }

    #[test]
    fn test_parse_kline_coerces_malformed_numbers() {
        let row = vec![json!(1_704_067_200_000_i64), json!("n/a"), json!(null), json!(1.5)];
        let bar = parse_kline(&row).unwrap();
        assert!(bar.open.is_nan());
        assert!(bar.high.is_nan());
        assert_eq!(bar.low, 1.5);
        assert!(bar.close.is_nan());
        assert!(bar.volume.is_nan());
    }

    #[test]
    fn test_parse_kline_requires_timestamp() {
        assert!(parse_kline(&[json!("x"), json!("1")]).is_none());
        assert!(parse_kline(&[]).is_none());
    }
}
