//! # Factor Lab
//!
//! Cross-sectional factor research for crypto spot markets.
//!
//! ## Pipeline
//! - [`data`]: OHLCV bars from the exchange, cached as parquet
//! - [`universe`]: per-symbol bars -> one close-price matrix on a shared grid
//! - [`factors`]: price matrix -> signal matrix (momentum, mean reversion, EWMA crossover)
//! - [`rank`]: signals -> cross-sectional percentile ranks
//! - [`backtest`]: ranks -> rebalanced long/short weights -> returns, equity, turnover
//!
//! ## Example
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use factor_lab::{run_backtest, signal_matrix, BacktestParams, Factor, Frame};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let index: Vec<_> = (0..4).map(|i| start + Duration::days(i)).collect();
//! let prices = Frame::from_columns(
//!     index,
//!     vec![
//!         ("A".to_string(), vec![100.0, 110.0, 99.0, 105.0]),
//!         ("B".to_string(), vec![100.0, 95.0, 100.0, 100.0]),
//!     ],
//! );
//!
//! let signals = signal_matrix(&prices, Factor::Momentum { lookback: 1 });
//! let params = BacktestParams { top_q: 0.5, bottom_q: 0.5, rebalance_every: 1, ..Default::default() };
//! let result = run_backtest(&signals, &prices, &params);
//! assert_eq!(result.weights.row(3), &[-1.0, 1.0]);
//! ```

pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod factors;
pub mod frame;
pub mod rank;
pub mod universe;
pub mod backtest;

// Re-export commonly used items at crate root
pub use backtest::{
    compute_metrics, run_backtest, BacktestParams, BacktestResult, OverlapRule, PerformanceMetrics,
    TurnoverSummary,
};
pub use config::AppConfig;
pub use data::{Bar, BarTable, ExchangeClient, ExchangeConfig, ParquetCache, PriceStore, RetryPolicy};
pub use error::{Error, Result};
pub use factors::{signal_matrix, Factor};
pub use frame::{Frame, TimeSeries};
pub use rank::cross_sectional_rank;
pub use universe::{align_universe, Frequency};
