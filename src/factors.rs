//! Factor library
//!
//! Each factor maps a close-price series to a same-length signal series.
//! Every signal is lagged by one period, so the value at row `t` only uses
//! prices observed up to `t - 1`.

use serde::{Deserialize, Serialize};

use crate::common::{fill_nan, mean, nan_vec, pct_change, rolling, sample_std, shift};
use crate::frame::Frame;

/// Rows a signal is delayed relative to the price that produced it.
pub const SIGNAL_LAG: usize = 1;

/// Adjusted exponentially weighted mean with `alpha = 2 / (span + 1)`.
///
/// Weights keep decaying across missing observations; output is NaN until
/// the first observation.
pub fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return nan_vec(values.len());
    }
    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut num = 0.0;
    let mut den = 0.0;

    values
        .iter()
        .map(|&x| {
            num *= decay;
            den *= decay;
            if !x.is_nan() {
                num += x;
                den += 1.0;
            }
            if den > 0.0 {
                num / den
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Rolling sample standard deviation (full window required)
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, sample_std)
}

fn zero_to_nan(values: Vec<f64>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| if v == 0.0 { f64::NAN } else { v })
        .collect()
}

/// Past-return momentum: `close[t-1] / close[t-1-lookback] - 1`
pub fn momentum(close: &[f64], lookback: usize) -> Vec<f64> {
    shift(&pct_change(close, lookback), SIGNAL_LAG)
}

/// Negated z-score of the latest one-period return against its rolling
/// mean and sample deviation. Zero deviation gives NaN.
pub fn mean_reversion_zscore(close: &[f64], lookback: usize) -> Vec<f64> {
    let ret = fill_nan(&pct_change(close, 1), 0.0);
    let mu = rolling(&ret, lookback, mean);
    let sigma = zero_to_nan(rolling_std(&ret, lookback));

    let z: Vec<f64> = (0..ret.len())
        .map(|i| -((ret[i] - mu[i]) / sigma[i]))
        .collect();
    shift(&z, SIGNAL_LAG)
}

/// EWMA crossover normalised by price volatility:
/// `(ewm(fast) - ewm(slow)) / rolling_std(std_window)`.
///
/// Positive values indicate an uptrend. Missing values become 0.
pub fn ewma_crossover(close: &[f64], fast: usize, slow: usize, std_window: usize) -> Vec<f64> {
    let fast_ewma = ewm_mean(close, fast);
    let slow_ewma = ewm_mean(close, slow);
    let vol = zero_to_nan(rolling_std(close, std_window));

    let signal: Vec<f64> = (0..close.len())
        .map(|i| (fast_ewma[i] - slow_ewma[i]) / vol[i])
        .collect();
    fill_nan(&shift(&signal, SIGNAL_LAG), 0.0)
}

/// A factor and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Factor {
    Momentum {
        lookback: usize,
    },
    MeanReversion {
        lookback: usize,
    },
    EwmaCrossover {
        fast: usize,
        slow: usize,
        std_window: usize,
    },
}

impl Default for Factor {
    fn default() -> Self {
        Factor::Momentum { lookback: 21 }
    }
}

impl Factor {
    pub fn name(&self) -> &'static str {
        match self {
            Factor::Momentum { .. } => "momentum",
            Factor::MeanReversion { .. } => "mean_reversion",
            Factor::EwmaCrossover { .. } => "ewma_crossover",
        }
    }

    pub fn compute(&self, close: &[f64]) -> Vec<f64> {
        match *self {
            Factor::Momentum { lookback } => momentum(close, lookback),
            Factor::MeanReversion { lookback } => mean_reversion_zscore(close, lookback),
            Factor::EwmaCrossover { fast, slow, std_window } => {
                ewma_crossover(close, fast, slow, std_window)
            }
        }
    }
}

/// Apply `factor` to every column of a price matrix.
pub fn signal_matrix(prices: &Frame, factor: Factor) -> Frame {
    prices.map_columns(|close| factor.compute(close))
}
