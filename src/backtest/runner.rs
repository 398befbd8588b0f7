// src/backtest/runner.rs
// Main backtest runner - signals + prices -> weights, returns, equity, turnover

use tracing::{debug, info};

use crate::backtest::rebalance::scheduled_weights;
use crate::backtest::returns::simulate_returns;
use crate::backtest::types::{BacktestParams, BacktestResult};
use crate::frame::Frame;

/// Run the full cross-sectional backtest.
///
/// Pure and deterministic: identical inputs give bit-identical outputs.
/// Empty inputs give empty or zero-valued outputs.
pub fn run_backtest(signals: &Frame, prices: &Frame, params: &BacktestParams) -> BacktestResult {
    debug!(
        rows = signals.n_rows(),
        symbols = signals.n_cols(),
        rebalance_every = params.rebalance_every,
        "running backtest"
    );

    let weights = scheduled_weights(signals, params);
    let (daily_returns, summary) = simulate_returns(&weights, prices, params.transaction_cost_bps);
    let cumulative = daily_returns.compounded();

    info!(
        periods = daily_returns.len(),
        final_equity = cumulative.last().unwrap_or(1.0),
        turnover_mean = summary.turnover_mean,
        rebalances = summary.rebalance_count,
        "backtest complete"
    );

    BacktestResult { daily_returns, cumulative, summary, weights }
}
