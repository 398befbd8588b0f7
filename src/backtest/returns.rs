// src/backtest/returns.rs
// Return simulation: lagged weights x price changes, net of turnover cost

use chrono::{DateTime, Utc};

use crate::backtest::metrics::calculate_turnover;
use crate::backtest::types::TurnoverSummary;
use crate::common::pct_change;
use crate::frame::{Frame, TimeSeries};

/// Rows between a weight decision and the period it earns.
pub const EXECUTION_LAG: usize = 1;

/// Period-over-period price changes aligned to `index`.
///
/// Prices are forward-filled onto the index first. The first row, missing
/// prices and zero prior prices all give a 0 change.
fn price_changes(prices: &Frame, index: &[DateTime<Utc>]) -> Frame {
    prices.reindex_ffill(index).map_columns(|col| {
        pct_change(col, 1)
            .into_iter()
            .map(|r| if r.is_finite() { r } else { 0.0 })
            .collect()
    })
}

/// Simulate the portfolio defined by `weights` against `prices`.
///
/// The weight row decided at `t` is held over `t + EXECUTION_LAG`. Turnover
/// is zero for the first `EXECUTION_LAG + 1` rows and is charged at
/// `cost` per unit; `cost` is a raw rate, not divided by 10 000.
pub fn simulate_returns(weights: &Frame, prices: &Frame, cost: f64) -> (TimeSeries, TurnoverSummary) {
    let n = weights.n_rows();
    let changes = price_changes(prices, &weights.index);
    let lagged = weights.shift_rows(EXECUTION_LAG).fill_nan(0.0);

    // weight column -> price column; unpriced symbols earn nothing
    let price_cols: Vec<Option<usize>> = weights
        .columns
        .iter()
        .map(|name| changes.column_position(name))
        .collect();

    let mut returns = Vec::with_capacity(n);
    let mut per_period = Vec::with_capacity(n);

    for t in 0..n {
        let held = lagged.row(t);
        let turnover = if t <= EXECUTION_LAG {
            0.0
        } else {
            calculate_turnover(lagged.row(t - 1), held)
        };

        let gross: f64 = held
            .iter()
            .zip(&price_cols)
            .filter_map(|(w, col)| col.map(|j| w * changes.get(t, j)))
            .sum();

        returns.push(gross - turnover * cost);
        per_period.push(turnover);
    }

    let turnover_total: f64 = per_period.iter().sum();
    let summary = TurnoverSummary {
        turnover_mean: if n > 0 { turnover_total / n as f64 } else { 0.0 },
        turnover_total,
        rebalance_count: per_period.iter().filter(|&&x| x > 0.0).count(),
        per_period,
    };

    (TimeSeries::new(weights.index.clone(), returns), summary)
}
