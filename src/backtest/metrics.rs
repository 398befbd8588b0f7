// src/backtest/metrics.rs
// Performance metrics calculation

use crate::backtest::types::PerformanceMetrics;
use crate::common::{mean, sample_std};

/// Periods per year for daily bars
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calculate all performance metrics from a period return series.
///
/// Missing values are dropped first; an empty series yields all zeros.
/// `avg_turnover` is left at 0 for the caller to fill from the backtest
/// summary.
pub fn compute_metrics(returns: &[f64], periods_per_year: f64) -> PerformanceMetrics {
    let returns: Vec<f64> = returns.iter().copied().filter(|r| !r.is_nan()).collect();
    if returns.is_empty() {
        return PerformanceMetrics::default();
    }

    let equity = compound(&returns);
    let total_return = equity.last().copied().unwrap_or(1.0) - 1.0;

    let annual_return = annualized_return(&returns, periods_per_year);
    let annual_vol = annualized_volatility(&returns, periods_per_year);
    let max_drawdown = calculate_max_drawdown(&equity);

    // Risk-free rate of 0
    let sharpe = if annual_vol > 0.0 { annual_return / annual_vol } else { 0.0 };

    let downside_vol = downside_deviation(&returns, periods_per_year);
    let sortino = if downside_vol > 0.0 { annual_return / downside_vol } else { 0.0 };

    let calmar = if max_drawdown != 0.0 {
        annual_return / max_drawdown.abs()
    } else {
        0.0
    };

    let win_days = returns.iter().filter(|&&r| r > 0.0).count();
    let win_rate = win_days as f64 / returns.len() as f64;

    let best_day = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let worst_day = returns.iter().copied().fold(f64::INFINITY, f64::min);

    PerformanceMetrics {
        days: returns.len(),
        total_return,
        annual_return,
        annual_vol,
        sharpe,
        sortino,
        calmar,
        max_drawdown,
        win_rate,
        best_day: if best_day.is_finite() { best_day } else { 0.0 },
        worst_day: if worst_day.is_finite() { worst_day } else { 0.0 },
        avg_turnover: 0.0, // Set separately
    }
}

/// `(1 + mean)^periods - 1`
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    (1.0 + mean(returns)).powf(periods_per_year) - 1.0
}

/// Sample standard deviation scaled by `sqrt(periods)`; 0 below two observations
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    let std = sample_std(returns);
    if std.is_finite() {
        std * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Calculate downside deviation (for Sortino ratio)
fn downside_deviation(returns: &[f64], periods_per_year: f64) -> f64 {
    let sum_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.powi(2)).sum();
    if sum_sq == 0.0 {
        return 0.0;
    }
    (sum_sq / returns.len() as f64).sqrt() * periods_per_year.sqrt()
}

/// Wealth curve: running product of `1 + r`
fn compound(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |wealth, r| {
            *wealth *= 1.0 + r;
            Some(*wealth)
        })
        .collect()
}

/// Largest peak-to-trough fall of a wealth curve, as a non-positive fraction
pub fn calculate_max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0;

    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Turnover between two weight rows: half the total absolute change, so a
/// simultaneous buy and sell of one unit counts once.
pub fn calculate_turnover(prev: &[f64], curr: &[f64]) -> f64 {
    let total_change: f64 = prev
        .iter()
        .zip(curr)
        .map(|(p, c)| (c - p).abs())
        .filter(|d| d.is_finite())
        .sum();
    total_change / 2.0
}
