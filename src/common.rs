//! Common utilities shared across factor and backtest modules
//!
//! Missing data is represented as `f64::NAN` throughout the crate.

/// Initialize a result vector with NaN values
#[inline]
pub fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Check if we have enough data for the given period
#[inline]
pub fn has_enough_data(len: usize, period: usize) -> bool {
    len >= period && period > 0
}

/// Calculate the mean of a slice
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Safe division that returns NaN on divide by zero
#[inline]
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Compute rolling window operation
/// Returns vector of same length with NaN for insufficient lookback.
/// A window containing NaN yields NaN.
pub fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    if !has_enough_data(n, period) {
        return nan_vec(n);
    }

    let mut result = nan_vec(n);
    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(window);
    }
    result
}

/// Shift values forward by `periods`, filling the vacated head with NaN.
///
/// `shift(x, 1)[t] == x[t - 1]`.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    for i in periods..n {
        result[i] = values[i - periods];
    }
    result
}

/// Percentage change over `periods`: `x[t] / x[t - periods] - 1`
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    if periods == 0 {
        return result;
    }
    for i in periods..n {
        result[i] = safe_div(values[i], values[i - periods]) - 1.0;
    }
    result
}

/// Replace NaN with `fill`
pub fn fill_nan(values: &[f64], fill: f64) -> Vec<f64> {
    values.iter().map(|&v| if v.is_nan() { fill } else { v }).collect()
}

/// Quantile of the non-NaN values using linear interpolation between
/// order statistics. NaN when no value is present.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || q.is_nan() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q = q.clamp(0.0, 1.0);
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
