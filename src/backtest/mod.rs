// src/backtest/mod.rs
// Cross-sectional backtest engine

pub mod types;
pub mod weighting;
pub mod rebalance;
pub mod returns;
pub mod metrics;
pub mod runner;

// Re-export main types and functions
pub use types::*;
pub use weighting::rank_to_weights;
pub use rebalance::scheduled_weights;
pub use returns::{simulate_returns, EXECUTION_LAG};
pub use metrics::{compute_metrics, TRADING_DAYS_PER_YEAR};
pub use runner::run_backtest;
