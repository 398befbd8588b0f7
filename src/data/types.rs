//! OHLCV bar types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Time-indexed OHLCV table stored column-wise.
///
/// After [`crate::universe::clean_bars`] the timestamps are strictly
/// increasing with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct BarTable {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl BarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut table = Self::with_capacity(bars.len());
        for bar in bars {
            table.push(*bar);
        }
        table
    }

    pub fn push(&mut self, bar: Bar) {
        self.timestamps.push(bar.timestamp);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn bar(&self, i: usize) -> Bar {
        Bar {
            timestamp: self.timestamps[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    pub fn bars(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).map(move |i| self.bar(i))
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Rows with `start <= timestamp <= end`. Assumes sorted timestamps.
    pub fn slice_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BarTable {
        let from = self.timestamps.partition_point(|ts| *ts < start);
        let to = self.timestamps.partition_point(|ts| *ts <= end).max(from);
        BarTable {
            timestamps: self.timestamps[from..to].to_vec(),
            open: self.open[from..to].to_vec(),
            high: self.high[from..to].to_vec(),
            low: self.low[from..to].to_vec(),
            close: self.close[from..to].to_vec(),
            volume: self.volume[from..to].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn table(n: usize) -> BarTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..n)
            .map(|i| Bar {
                timestamp: start + Duration::days(i as i64),
                open: i as f64,
                high: i as f64 + 1.0,
                low: i as f64 - 1.0,
                close: i as f64,
                volume: 10.0,
            })
            .collect();
        BarTable::from_bars(&bars)
    }

    #[test]
    fn test_slice_range_inclusive() {
        let t = table(5);
        let sliced = t.slice_range(t.timestamps[1], t.timestamps[3]);
        assert_eq!(sliced.len(), 3);
        assert_eq!(sliced.close, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_slice_range_outside() {
        let t = table(3);
        let late = t.timestamps[2] + Duration::days(10);
        assert!(t.slice_range(late, late + Duration::days(1)).is_empty());
        // inverted range is empty rather than a panic
        assert!(t.slice_range(t.timestamps[2], t.timestamps[0]).is_empty());
    }

    #[test]
    fn test_bar_roundtrip_through_table() {
        let t = table(2);
        let bars: Vec<Bar> = t.bars().collect();
        assert_eq!(BarTable::from_bars(&bars), t);
    }
}
