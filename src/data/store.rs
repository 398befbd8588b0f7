//! Cached-or-fetched price history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::cache::ParquetCache;
use super::exchange::ExchangeClient;
use super::types::BarTable;
use crate::error::Result;

/// Price history backed by a parquet cache and an exchange client.
pub struct PriceStore {
    client: ExchangeClient,
    cache: ParquetCache,
}

impl PriceStore {
    pub fn new(client: ExchangeClient, cache: ParquetCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ExchangeClient {
        &self.client
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }

    /// Hand back the client and cache, e.g. to close the client.
    pub fn into_parts(self) -> (ExchangeClient, ParquetCache) {
        (self.client, self.cache)
    }

    /// Load from cache unless `force_refresh`, otherwise fetch and cache
    /// non-empty results.
    pub async fn fetch_cached(
        &self,
        symbol: &str,
        timeframe: &str,
        force_refresh: bool,
    ) -> Result<BarTable> {
        if !force_refresh {
            if let Some(cached) = self.cache.read(symbol, timeframe)? {
                info!(symbol, timeframe, rows = cached.len(), "loaded from cache");
                return Ok(cached);
            }
        }

        info!(symbol, timeframe, "fetching from exchange");
        let table = self.client.fetch_ohlcv(symbol, timeframe, None, None).await?;
        if !table.is_empty() {
            self.cache.write(symbol, timeframe, &table)?;
        }
        Ok(table)
    }

    /// Cached-or-fetched history restricted to `start..=end`.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: &str,
    ) -> Result<BarTable> {
        info!(symbol, %start, %end, "fetching date range");
        let table = self.fetch_cached(symbol, timeframe, false).await?;
        if table.is_empty() {
            return Ok(table);
        }
        Ok(table.slice_range(start, end))
    }

    /// Fetch every symbol. Failures and empty histories are logged and
    /// skipped so one bad market does not sink the universe.
    pub async fn load_universe(
        &self,
        symbols: &[String],
        timeframe: &str,
        force_refresh: bool,
    ) -> BTreeMap<String, BarTable> {
        let mut out = BTreeMap::new();
        for symbol in symbols {
            match self.fetch_cached(symbol, timeframe, force_refresh).await {
                Ok(table) if table.is_empty() => warn!(symbol = %symbol, "no history, skipping"),
                Ok(table) => {
                    out.insert(symbol.clone(), table);
                }
                Err(e) => warn!(symbol = %symbol, "fetch failed, skipping: {}", e),
            }
        }
        out
    }

    /// Top `n` symbols by quote volume (falls back to a fixed list).
    pub async fn top_symbols(&self, n: usize, quote: &str) -> Vec<String> {
        self.client.top_symbols(n, quote).await
    }
}
