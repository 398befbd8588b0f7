// src/backtest/types.rs
// Parameters and results for the cross-sectional backtest

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, TimeSeries};

// ============================================================================
// Parameters
// ============================================================================

/// Which side keeps a symbol whose rank clears both cutoffs.
///
/// Only reachable when `top_q <= bottom_q` or when ties put several
/// symbols exactly on both cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OverlapRule {
    #[default]
    LongsFirst,
    ShortsFirst,
}

/// Backtest knobs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BacktestParams {
    /// Quantile of the rank row at or above which a symbol is held long
    pub top_q: f64,
    /// Quantile of the rank row at or below which a symbol is held short
    pub bottom_q: f64,
    /// Rebalance on every row whose position is a multiple of this (0 acts as 1)
    pub rebalance_every: usize,
    /// Cost per unit of turnover, applied as-is (already scaled by the caller)
    pub transaction_cost_bps: f64,
    pub long_short: bool,
    pub overlap: OverlapRule,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            top_q: 0.9,
            bottom_q: 0.1,
            rebalance_every: 21,
            transaction_cost_bps: 0.0,
            long_short: true,
            overlap: OverlapRule::LongsFirst,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Turnover accounting for a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverSummary {
    pub turnover_mean: f64,
    pub turnover_total: f64,
    /// Periods on which the held weights actually changed
    pub rebalance_count: usize,
    pub per_period: Vec<f64>,
}

/// Everything a run produces, so callers can audit the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub daily_returns: TimeSeries,
    pub cumulative: TimeSeries,
    pub summary: TurnoverSummary,
    pub weights: Frame,
}

/// Performance metrics
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub days: usize,
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_vol: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub avg_turnover: f64,
}
