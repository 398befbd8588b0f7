// src/backtest/rebalance.rs
// Scheduled rebalancing: ranks -> weight matrix held between rebalances

use crate::backtest::types::BacktestParams;
use crate::backtest::weighting::rank_to_weights;
use crate::frame::Frame;
use crate::rank::cross_sectional_rank;

/// True when row `i` is a scheduled rebalance.
#[inline]
pub fn is_rebalance_row(i: usize, rebalance_every: usize) -> bool {
    i % rebalance_every.max(1) == 0
}

/// Build the weight matrix from a signal matrix.
///
/// Signals are ranked across symbols, new weights are computed on every
/// `rebalance_every`-th row (row 0 included) and carried forward unchanged
/// until the next one.
pub fn scheduled_weights(signals: &Frame, params: &BacktestParams) -> Frame {
    let ranks = cross_sectional_rank(signals);
    let width = ranks.n_cols();

    let mut held = vec![0.0; width];
    let mut values = Vec::with_capacity(ranks.n_rows());
    for i in 0..ranks.n_rows() {
        if is_rebalance_row(i, params.rebalance_every) {
            held = rank_to_weights(ranks.row(i), params);
        }
        values.push(held.clone());
    }

    Frame::new(signals.index.clone(), signals.columns.clone(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn alternating_signals(n: usize) -> Frame {
        // leadership flips every row
        let a: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let b: Vec<f64> = a.iter().map(|v| -v).collect();
        Frame::from_columns(days(n), vec![("A".into(), a), ("B".into(), b)])
    }

    #[test]
    fn test_weights_held_between_rebalances() {
        let signals = alternating_signals(7);
        let params = BacktestParams { rebalance_every: 3, top_q: 0.5, bottom_q: 0.5, ..Default::default() };
        let w = scheduled_weights(&signals, &params);

        // rebalances at rows 0, 3, 6
        assert_eq!(w.row(0), &[1.0, -1.0]);
        assert_eq!(w.row(1), w.row(0));
        assert_eq!(w.row(2), w.row(0));
        assert_eq!(w.row(3), &[-1.0, 1.0]);
        assert_eq!(w.row(4), w.row(3));
        assert_eq!(w.row(5), w.row(3));
        assert_eq!(w.row(6), &[1.0, -1.0]);
    }

    #[test]
    fn test_missing_signals_before_first_valid_rebalance_are_flat() {
        let signals = Frame::from_columns(
            days(3),
            vec![("A".into(), vec![f64::NAN, 2.0, 3.0]), ("B".into(), vec![f64::NAN, 1.0, 4.0])],
        );
        let params = BacktestParams { rebalance_every: 2, top_q: 0.5, bottom_q: 0.5, ..Default::default() };
        let w = scheduled_weights(&signals, &params);
        assert_eq!(w.row(0), &[0.0, 0.0]);
        assert_eq!(w.row(1), &[0.0, 0.0]);
        assert_eq!(w.row(2), &[-1.0, 1.0]);
    }

    #[test]
    fn test_zero_rebalance_every_rebalances_each_row() {
        let signals = alternating_signals(3);
        let params = BacktestParams { rebalance_every: 0, top_q: 0.5, bottom_q: 0.5, ..Default::default() };
        let w = scheduled_weights(&signals, &params);
        assert_eq!(w.row(1), &[-1.0, 1.0]);
    }

    #[test]
    fn test_empty_inputs() {
        let w = scheduled_weights(&Frame::default(), &BacktestParams::default());
        assert_eq!(w.n_rows(), 0);

        let no_symbols = Frame::new(days(3), vec![], vec![]);
        let w = scheduled_weights(&no_symbols, &BacktestParams::default());
        assert_eq!(w.n_rows(), 3);
        assert!(w.values.iter().all(|row| row.is_empty()));
    }
}
