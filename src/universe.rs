//! Universe alignment
//!
//! Turns per-symbol bar tables into one close-price matrix on a shared,
//! regular timestamp grid.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::data::types::BarTable;
use crate::error::{Error, Result};
use crate::frame::Frame;

const MINUTE_MS: i64 = 60_000;

/// Resampling frequency, epoch-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    millis: i64,
}

impl Frequency {
    pub fn minutes(n: i64) -> Self {
        Self { millis: n * MINUTE_MS }
    }

    pub fn hours(n: i64) -> Self {
        Self::minutes(n * 60)
    }

    pub fn days(n: i64) -> Self {
        Self::hours(n * 24)
    }

    pub fn weeks(n: i64) -> Self {
        Self::days(n * 7)
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Parse `"1D"`, `"4h"`, `"15min"`, `"1W"`. A bare unit means a count of 1.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| Error::InvalidFrequency(s.to_string()))?
        };
        if count < 1 {
            return Err(Error::InvalidFrequency(s.to_string()));
        }

        match unit {
            "min" | "m" | "T" => Ok(Self::minutes(count)),
            "h" | "H" => Ok(Self::hours(count)),
            "D" | "d" => Ok(Self::days(count)),
            "W" | "w" => Ok(Self::weeks(count)),
            _ => Err(Error::InvalidFrequency(s.to_string())),
        }
    }

    fn bucket(&self, ts: DateTime<Utc>) -> i64 {
        ts.timestamp_millis().div_euclid(self.millis) * self.millis
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::days(1)
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.millis / MINUTE_MS;
        if m % (7 * 24 * 60) == 0 {
            write!(f, "{}W", m / (7 * 24 * 60))
        } else if m % (24 * 60) == 0 {
            write!(f, "{}D", m / (24 * 60))
        } else if m % 60 == 0 {
            write!(f, "{}h", m / 60)
        } else {
            write!(f, "{}min", m)
        }
    }
}

/// Drop duplicate timestamps (first occurrence wins) and sort ascending.
pub fn clean_bars(table: &BarTable) -> BarTable {
    let mut seen = HashSet::with_capacity(table.len());
    let mut keep: Vec<usize> = (0..table.len())
        .filter(|&i| seen.insert(table.timestamps[i]))
        .collect();
    keep.sort_by_key(|&i| table.timestamps[i]);

    let mut out = BarTable::with_capacity(keep.len());
    for i in keep {
        out.push(table.bar(i));
    }
    out
}

/// Last non-missing close per bucket on a contiguous grid, forward-filled.
fn resample_close(table: &BarTable, freq: Frequency) -> BTreeMap<i64, f64> {
    let mut buckets: BTreeMap<i64, f64> = BTreeMap::new();
    for (ts, &close) in table.timestamps.iter().zip(&table.close) {
        let key = freq.bucket(*ts);
        if close.is_nan() {
            buckets.entry(key).or_insert(f64::NAN);
        } else {
            buckets.insert(key, close);
        }
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return BTreeMap::new(),
    };

    let mut grid = BTreeMap::new();
    let mut carry = f64::NAN;
    let mut key = first;
    while key <= last {
        if let Some(&v) = buckets.get(&key) {
            if !v.is_nan() {
                carry = v;
            }
        }
        grid.insert(key, carry);
        key += freq.as_millis();
    }
    grid
}

/// Build the aligned close-price matrix.
///
/// Each symbol is cleaned, resampled to `freq` and forward-filled within
/// its own history; symbols are then outer-joined on timestamp. Columns
/// with no data at all are dropped.
pub fn align_universe(tables: &BTreeMap<String, BarTable>, freq: Frequency) -> Frame {
    let mut closes: Vec<(String, BTreeMap<i64, f64>)> = Vec::new();
    for (symbol, table) in tables {
        let cleaned = clean_bars(table);
        if cleaned.is_empty() {
            continue;
        }
        closes.push((symbol.clone(), resample_close(&cleaned, freq)));
    }
    if closes.is_empty() {
        return Frame::default();
    }

    let keys: Vec<i64> = closes
        .iter()
        .flat_map(|(_, grid)| grid.keys().copied())
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect();
    let position: HashMap<i64, usize> = keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
    let index: Vec<DateTime<Utc>> = keys
        .iter()
        .filter_map(|&k| DateTime::from_timestamp_millis(k))
        .collect();

    let columns = closes
        .into_iter()
        .filter(|(_, grid)| grid.values().any(|v| !v.is_nan()))
        .map(|(symbol, grid)| {
            let mut col = vec![f64::NAN; keys.len()];
            for (k, v) in grid {
                if let Some(&i) = position.get(&k) {
                    col[i] = v;
                }
            }
            (symbol, col)
        })
        .collect();

    Frame::from_columns(index, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Bar;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn bar(ts: DateTime<Utc>, close: f64) -> Bar {
        Bar { timestamp: ts, open: close, high: close, low: close, close, volume: 1.0 }
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!(Frequency::parse("1D").unwrap(), Frequency::days(1));
        assert_eq!(Frequency::parse("D").unwrap(), Frequency::days(1));
        assert_eq!(Frequency::parse("4h").unwrap(), Frequency::hours(4));
        assert_eq!(Frequency::parse("15min").unwrap(), Frequency::minutes(15));
        assert_eq!(Frequency::parse("2W").unwrap(), Frequency::weeks(2));
        assert!(Frequency::parse("0D").is_err());
        assert!(Frequency::parse("3y").is_err());
        assert!(Frequency::parse("").is_err());
    }

    #[test]
    fn test_frequency_display() {
        assert_eq!(Frequency::days(1).to_string(), "1D");
        assert_eq!(Frequency::hours(4).to_string(), "4h");
        assert_eq!(Frequency::minutes(90).to_string(), "90min");
        assert_eq!(Frequency::weeks(1).to_string(), "1W");
    }

    #[test]
    fn test_clean_bars_dedups_and_sorts() {
        let table = BarTable::from_bars(&[
            bar(day(3), 3.0),
            bar(day(1), 1.0),
            bar(day(3), 99.0),
            bar(day(2), 2.0),
        ]);
        let cleaned = clean_bars(&table);
        assert_eq!(cleaned.timestamps, vec![day(1), day(2), day(3)]);
        assert_eq!(cleaned.close, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_align_forward_fills_gaps() {
        let mut tables = BTreeMap::new();
        tables.insert(
            "BTC/USDT".to_string(),
            BarTable::from_bars(&[bar(day(1), 10.0), bar(day(4), 13.0)]),
        );
        let frame = align_universe(&tables, Frequency::days(1));
        assert_eq!(frame.index, vec![day(1), day(2), day(3), day(4)]);
        assert_eq!(frame.column(0), vec![10.0, 10.0, 10.0, 13.0]);
    }

    #[test]
    fn test_align_takes_last_close_in_bucket() {
        let mut tables = BTreeMap::new();
        tables.insert(
            "ETH/USDT".to_string(),
            BarTable::from_bars(&[
                bar(day(1), 1.0),
                bar(day(1) + Duration::hours(12), 1.5),
                bar(day(2) + Duration::hours(6), 2.0),
                bar(day(2) + Duration::hours(18), f64::NAN),
            ]),
        );
        let frame = align_universe(&tables, Frequency::days(1));
        assert_eq!(frame.index, vec![day(1), day(2)]);
        assert_eq!(frame.column(0), vec![1.5, 2.0]);
    }

    #[test]
    fn test_align_outer_join_leaves_outside_range_missing() {
        let mut tables = BTreeMap::new();
        tables.insert("A".to_string(), BarTable::from_bars(&[bar(day(1), 1.0), bar(day(3), 3.0)]));
        tables.insert("B".to_string(), BarTable::from_bars(&[bar(day(2), 20.0), bar(day(3), 30.0)]));
        let frame = align_universe(&tables, Frequency::days(1));
        assert_eq!(frame.columns, vec!["A", "B"]);
        assert!(frame.get(0, 1).is_nan());
        assert_eq!(frame.column(0), vec![1.0, 1.0, 3.0]);
        assert_eq!(frame.get(2, 1), 30.0);
    }

    #[test]
    fn test_align_drops_all_missing_columns() {
        let mut tables = BTreeMap::new();
        tables.insert("GOOD".to_string(), BarTable::from_bars(&[bar(day(1), 1.0), bar(day(2), 2.0)]));
        tables.insert(
            "JUNK".to_string(),
            BarTable::from_bars(&[bar(day(1), f64::NAN), bar(day(2), f64::NAN)]),
        );
        tables.insert("EMPTY".to_string(), BarTable::new());
        let frame = align_universe(&tables, Frequency::days(1));
        assert_eq!(frame.columns, vec!["GOOD"]);
        assert_eq!(frame.n_rows(), 2);
    }

    #[test]
    fn test_align_empty_universe() {
        let frame = align_universe(&BTreeMap::new(), Frequency::days(1));
        assert!(frame.is_empty());
        assert_eq!(frame.n_rows(), 0);
    }
}
