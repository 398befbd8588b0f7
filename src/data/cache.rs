//! On-disk parquet cache, one file per symbol and timeframe.
//!
//! Schema: `timestamp` (Timestamp ms), `open`, `high`, `low`, `close`,
//! `volume` (Float64). A write followed by a read returns an equal table.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use super::types::BarTable;
use crate::error::{Error, Result};

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Symbol+timeframe keyed parquet files under a root directory.
#[derive(Debug, Clone)]
pub struct ParquetCache {
    root: PathBuf,
}

impl ParquetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/BTC-USDT__1d.parquet`
    pub fn path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.root
            .join(format!("{}__{}.parquet", symbol.replace('/', "-"), timeframe))
    }

    pub fn contains(&self, symbol: &str, timeframe: &str) -> bool {
        self.path(symbol, timeframe).exists()
    }

    /// Read a cached table, `Ok(None)` when the slot is empty.
    pub fn read(&self, symbol: &str, timeframe: &str) -> Result<Option<BarTable>> {
        let path = self.path(symbol, timeframe);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut table = BarTable::new();
        for batch in reader {
            let batch = batch?;
            append_batch(&mut table, &batch)?;
        }

        debug!(symbol, timeframe, rows = table.len(), path = %path.display(), "cache read");
        Ok(Some(table))
    }

    /// Persist `table`, replacing any previous contents of the slot.
    pub fn write(&self, symbol: &str, timeframe: &str, table: &BarTable) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path(symbol, timeframe);

        let schema = Arc::new(schema());
        let timestamps: Vec<i64> = table.timestamps.iter().map(|t| t.timestamp_millis()).collect();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMillisecondArray::from(timestamps)),
            Arc::new(Float64Array::from(table.open.clone())),
            Arc::new(Float64Array::from(table.high.clone())),
            Arc::new(Float64Array::from(table.low.clone())),
            Arc::new(Float64Array::from(table.close.clone())),
            Arc::new(Float64Array::from(table.volume.clone())),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns)?;

        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        debug!(symbol, timeframe, rows = table.len(), path = %path.display(), "cache write");
        Ok(path)
    }

    /// Delete a cached slot. Missing slots are not an error.
    pub fn remove(&self, symbol: &str, timeframe: &str) -> Result<()> {
        let path = self.path(symbol, timeframe);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn schema() -> Schema {
    let mut fields = vec![Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Millisecond, None),
        false,
    )];
    fields.extend(PRICE_COLUMNS.iter().map(|name| Field::new(*name, DataType::Float64, true)));
    Schema::new(fields)
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| Error::CacheSchema(format!("missing Float64 column `{}`", name)))
}

fn append_batch(table: &mut BarTable, batch: &RecordBatch) -> Result<()> {
    let ts = batch
        .column_by_name("timestamp")
        .and_then(|col| col.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| Error::CacheSchema("missing timestamp column".to_string()))?;

    let open = float_column(batch, "open")?;
    let high = float_column(batch, "high")?;
    let low = float_column(batch, "low")?;
    let close = float_column(batch, "close")?;
    let volume = float_column(batch, "volume")?;

    let value = |arr: &Float64Array, i: usize| if arr.is_null(i) { f64::NAN } else { arr.value(i) };

    for i in 0..batch.num_rows() {
        let timestamp = DateTime::from_timestamp_millis(ts.value(i))
            .ok_or_else(|| Error::CacheSchema(format!("timestamp out of range: {}", ts.value(i))))?;
        table.timestamps.push(timestamp);
        table.open.push(value(open, i));
        table.high.push(value(high, i));
        table.low.push(value(low, i));
        table.close.push(value(close, i));
        table.volume.push(value(volume, i));
    }
    Ok(())
}
