// src/backtest/weighting.rs
// Rank row -> long/short target weights

use crate::backtest::types::{BacktestParams, OverlapRule};
use crate::common::quantile;

/// Equal weights for `n` positions
fn equal_weights(n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        1.0 / n as f64
    }
}

/// Convert one row of percentile ranks into target weights.
///
/// Cutoffs are the `top_q` and `bottom_q` quantiles of the ranks present in
/// the row. Longs split +1 equally, shorts (when `long_short`) split -1
/// equally, everything else is 0. Missing ranks are never selected, and an
/// all-missing row is flat.
pub fn rank_to_weights(ranks: &[f64], params: &BacktestParams) -> Vec<f64> {
    let top_cut = quantile(ranks, params.top_q);
    let bottom_cut = quantile(ranks, params.bottom_q);

    // NaN on either side of a comparison is false, so missing ranks and
    // all-missing rows fall out here
    let mut longs: Vec<bool> = ranks.iter().map(|&r| r >= top_cut).collect();
    let mut shorts: Vec<bool> = ranks
        .iter()
        .map(|&r| params.long_short && r <= bottom_cut)
        .collect();

    for (long, short) in longs.iter_mut().zip(shorts.iter_mut()) {
        if *long && *short {
            match params.overlap {
                OverlapRule::LongsFirst => *short = false,
                OverlapRule::ShortsFirst => *long = false,
            }
        }
    }

    let long_w = equal_weights(longs.iter().filter(|&&l| l).count());
    let short_w = equal_weights(shorts.iter().filter(|&&s| s).count());

    longs
        .iter()
        .zip(&shorts)
        .map(|(&long, &short)| {
            if long {
                long_w
            } else if short {
                -short_w
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(top_q: f64, bottom_q: f64, long_short: bool) -> BacktestParams {
        BacktestParams { top_q, bottom_q, long_short, ..Default::default() }
    }

    fn side_sums(w: &[f64]) -> (f64, f64) {
        let long: f64 = w.iter().filter(|&&x| x > 0.0).sum();
        let short: f64 = w.iter().filter(|&&x| x < 0.0).sum();
        (long, short)
    }

    #[test]
    fn test_top_and_bottom_decile() {
        let ranks: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        let w = rank_to_weights(&ranks, &BacktestParams::default());
        // cutoffs 0.91 and 0.19
        assert_eq!(w[9], 1.0);
        assert_eq!(w[0], -1.0);
        assert!(w[1..9].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_weights_split_equally() {
        let ranks = vec![0.2, 0.4, 0.6, 0.8, 1.0];
        let w = rank_to_weights(&ranks, &params(0.6, 0.4, true));
        // cutoffs 0.68 and 0.52
        assert_eq!(w, vec![-0.5, -0.5, 0.0, 0.5, 0.5]);
        let (l, s) = side_sums(&w);
        assert!((l - 1.0).abs() < 1e-12);
        assert!((s + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_long_only_ignores_shorts() {
        let ranks = vec![0.25, 0.5, 0.75, 1.0];
        let w = rank_to_weights(&ranks, &params(0.5, 0.5, false));
        assert_eq!(w, vec![0.0, 0.0, 0.5, 0.5]);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_ranks_never_selected() {
        let ranks = vec![f64::NAN, 0.5, 1.0, f64::NAN];
        let w = rank_to_weights(&ranks, &params(0.9, 0.1, true));
        assert_eq!(w[0], 0.0);
        assert_eq!(w[3], 0.0);
        assert_eq!(w[2], 1.0);
        assert_eq!(w[1], -1.0);
    }

    #[test]
    fn test_all_missing_row_is_flat() {
        let w = rank_to_weights(&[f64::NAN; 4], &BacktestParams::default());
        assert_eq!(w, vec![0.0; 4]);
        assert!(rank_to_weights(&[], &BacktestParams::default()).is_empty());
    }

    #[test]
    fn test_overlap_longs_first() {
        // a two-way tie puts both symbols on both cutoffs
        let ranks = vec![0.75, 0.75];
        let w = rank_to_weights(&ranks, &params(0.5, 0.5, true));
        assert_eq!(w, vec![0.5, 0.5]);
    }

    #[test]
    fn test_overlap_shorts_first() {
        let ranks = vec![0.75, 0.75];
        let p = BacktestParams { overlap: OverlapRule::ShortsFirst, ..params(0.5, 0.5, true) };
        assert_eq!(rank_to_weights(&ranks, &p), vec![-0.5, -0.5]);
    }

    #[test]
    fn test_inverted_quantiles_resolve_by_rule() {
        // top_q < bottom_q: the middle symbol qualifies for both sides
        let ranks = vec![1.0 / 3.0, 2.0 / 3.0, 1.0];
        let w = rank_to_weights(&ranks, &params(0.5, 0.5, true));
        assert_eq!(w, vec![-1.0, 0.5, 0.5]);
        let w = rank_to_weights(&ranks, &params(0.2, 0.8, true));
        let (l, s) = side_sums(&w);
        assert!((l - 1.0).abs() < 1e-12);
        assert!((s + 1.0).abs() < 1e-12);
        assert_eq!(w[0], -1.0);
    }
}
