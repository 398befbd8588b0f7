//! Time-indexed tables
//!
//! [`Frame`] is the shared shape behind the Price, Signal, Rank and Weight
//! matrices: one row per timestamp, one column per symbol. [`TimeSeries`]
//! is a single labelled column (daily returns, equity curve).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Time-indexed table of f64 cells, `values[row][col]`.
///
/// Transforms return new frames; nothing here mutates a frame in place
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Frame {
    pub index: Vec<DateTime<Utc>>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl Frame {
    /// Build a frame from row-major values. Rows shorter or longer than
    /// `columns` are padded with NaN or truncated.
    pub fn new(index: Vec<DateTime<Utc>>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Self {
        let width = columns.len();
        let mut values = values;
        values.resize_with(index.len(), || vec![f64::NAN; width]);
        for row in values.iter_mut() {
            row.resize(width, f64::NAN);
        }
        Self { index, columns, values }
    }

    /// Build a frame from per-column vectors.
    pub fn from_columns(index: Vec<DateTime<Utc>>, columns: Vec<(String, Vec<f64>)>) -> Self {
        let n = index.len();
        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let mut values = vec![Vec::with_capacity(names.len()); n];
        for (_, col) in &columns {
            for (i, row) in values.iter_mut().enumerate() {
                row.push(col.get(i).copied().unwrap_or(f64::NAN));
            }
        }
        Self { index, columns: names, values }
    }

    /// Frame of the given shape filled with `fill`.
    pub fn filled(index: Vec<DateTime<Utc>>, columns: Vec<String>, fill: f64) -> Self {
        let values = vec![vec![fill; columns.len()]; index.len()];
        Self { index, columns, values }
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[j]).collect()
    }

    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.column_position(name).map(|j| self.column(j))
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    /// Apply a series transform to every column, keeping index and labels.
    pub fn map_columns<F>(&self, f: F) -> Frame
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let columns = (0..self.n_cols())
            .map(|j| (self.columns[j].clone(), f(&self.column(j))))
            .collect();
        Frame::from_columns(self.index.clone(), columns)
    }

    /// Apply a transform to every row, keeping index and labels.
    pub fn map_rows<F>(&self, f: F) -> Frame
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let values = self.values.iter().map(|row| f(row)).collect();
        Frame::new(self.index.clone(), self.columns.clone(), values)
    }

    /// Shift rows down by `periods`; vacated head rows are NaN.
    pub fn shift_rows(&self, periods: usize) -> Frame {
        let width = self.n_cols();
        let values = (0..self.n_rows())
            .map(|i| {
                if i >= periods {
                    self.values[i - periods].clone()
                } else {
                    vec![f64::NAN; width]
                }
            })
            .collect();
        Frame { index: self.index.clone(), columns: self.columns.clone(), values }
    }

    /// Replace every NaN cell with `fill`.
    pub fn fill_nan(&self, fill: f64) -> Frame {
        self.map_rows(|row| row.iter().map(|&v| if v.is_nan() { fill } else { v }).collect())
    }

    /// Align onto `index` by exact timestamp match, then forward-fill each
    /// column over the rows that had no match or held NaN.
    pub fn reindex_ffill(&self, index: &[DateTime<Utc>]) -> Frame {
        let width = self.n_cols();
        let mut values = Vec::with_capacity(index.len());
        let mut last = vec![f64::NAN; width];
        let mut cursor = 0;

        for ts in index {
            while cursor < self.index.len() && self.index[cursor] < *ts {
                cursor += 1;
            }
            if cursor < self.index.len() && self.index[cursor] == *ts {
                for (j, v) in self.values[cursor].iter().enumerate() {
                    if !v.is_nan() {
                        last[j] = *v;
                    }
                }
            }
            values.push(last.clone());
        }

        Frame { index: index.to_vec(), columns: self.columns.clone(), values }
    }
}

/// A single time-indexed column.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct TimeSeries {
    pub index: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(index: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        Self { index, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Running product of `1 + r`.
    pub fn compounded(&self) -> TimeSeries {
        let mut wealth = 1.0;
        let values = self
            .values
            .iter()
            .map(|r| {
                wealth *= 1.0 + r;
                wealth
            })
            .collect();
        TimeSeries { index: self.index.clone(), values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_from_columns_layout() {
        let f = Frame::from_columns(
            days(2),
            vec![("A".into(), vec![1.0, 2.0]), ("B".into(), vec![3.0, 4.0])],
        );
        assert_eq!(f.row(0), &[1.0, 3.0]);
        assert_eq!(f.row(1), &[2.0, 4.0]);
        assert_eq!(f.column_by_name("B"), Some(vec![3.0, 4.0]));
    }

    #[test]
    fn test_shift_rows() {
        let f = Frame::from_columns(days(3), vec![("A".into(), vec![1.0, 2.0, 3.0])]);
        let s = f.shift_rows(1);
        assert!(s.get(0, 0).is_nan());
        assert_eq!(s.get(1, 0), 1.0);
        assert_eq!(s.get(2, 0), 2.0);
    }

    #[test]
    fn test_reindex_ffill_fills_missing_rows() {
        let idx = days(4);
        let f = Frame::from_columns(
            vec![idx[0], idx[2]],
            vec![("A".into(), vec![10.0, 12.0])],
        );
        let r = f.reindex_ffill(&idx);
        assert_eq!(r.column(0), vec![10.0, 10.0, 12.0, 12.0]);
    }

    #[test]
    fn test_reindex_ffill_leading_gap_stays_nan() {
        let idx = days(3);
        let f = Frame::from_columns(vec![idx[1]], vec![("A".into(), vec![5.0])]);
        let r = f.reindex_ffill(&idx);
        assert!(r.get(0, 0).is_nan());
        assert_eq!(r.get(2, 0), 5.0);
    }

    #[test]
    fn test_compounded() {
        let s = TimeSeries::new(days(3), vec![0.0, 0.1, -0.5]);
        let c = s.compounded();
        assert_eq!(c.values[0], 1.0);
        assert!((c.values[1] - 1.1).abs() < 1e-12);
        assert!((c.values[2] - 0.55).abs() < 1e-12);
    }
}
