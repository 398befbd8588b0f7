//! Cross-sectional percentile ranks.

use crate::frame::Frame;

/// Percentile ranks of one row: average 1-based rank among the non-NaN
/// cells divided by their count. NaN cells stay NaN.
pub fn percentile_ranks(row: &[f64]) -> Vec<f64> {
    let mut present: Vec<(usize, f64)> = row
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, &v)| (i, v))
        .collect();
    let mut ranks = vec![f64::NAN; row.len()];
    if present.is_empty() {
        return ranks;
    }
    present.sort_by(|a, b| a.1.total_cmp(&b.1));

    let count = present.len() as f64;
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && present[end].1 == present[start].1 {
            end += 1;
        }
        // ties share the mean of positions start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &(i, _) in &present[start..end] {
            ranks[i] = avg / count;
        }
        start = end;
    }
    ranks
}

/// Rank every row of a signal matrix across its symbols.
pub fn cross_sectional_rank(signals: &Frame) -> Frame {
    signals.map_rows(percentile_ranks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values() {
        let r = percentile_ranks(&[0.3, -0.1, 0.7, 0.0]);
        assert_eq!(r, vec![0.75, 0.25, 1.0, 0.5]);
    }

    #[test]
    fn test_ties_use_average_rank() {
        let r = percentile_ranks(&[1.0, 1.0]);
        assert_eq!(r, vec![0.75, 0.75]);

        let r = percentile_ranks(&[5.0, 1.0, 5.0, 3.0]);
        assert_eq!(r, vec![0.875, 0.25, 0.875, 0.5]);
    }

    #[test]
    fn test_missing_cells_are_excluded() {
        let r = percentile_ranks(&[f64::NAN, 2.0, 1.0]);
        assert!(r[0].is_nan());
        assert_eq!(r[1], 1.0);
        assert_eq!(r[2], 0.5);
    }

    #[test]
    fn test_all_missing_and_empty() {
        assert!(percentile_ranks(&[f64::NAN, f64::NAN]).iter().all(|v| v.is_nan()));
        assert!(percentile_ranks(&[]).is_empty());
    }
}
