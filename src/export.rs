//! Serialization of the reshaped table into xlsx bytes.
//!
//! Output is deterministic for a given table: the workbook creation timestamp
//! is pinned so equal tables serialize to equal bytes, which is what makes
//! the content-hash memoization in [`ExportCache`] sound.

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, NaiveDate};
use color_eyre::{eyre::eyre, Result};
use polars::prelude::*;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet};

/// Sheet name of the serialized output.
pub const OUTPUT_SHEET_NAME: &str = "Transformed_Data";

/// Serialize a table to single-sheet xlsx bytes.
///
/// Header row from column names; numbers as numbers, booleans as booleans,
/// strings as strings, temporal values as ISO strings, nulls as blank cells.
pub fn write_xlsx(df: &DataFrame) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(OUTPUT_SHEET_NAME)?;
    for (col_idx, name) in df.get_column_names().iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, name.as_str())?;
    }
    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let series = column.as_materialized_series();
        for (row_idx, value) in series.iter().enumerate() {
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, &value)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

// f64 represents integers exactly only up to 2^53.
const MAX_EXACT_F64_INT: u64 = 1 << 53;

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &AnyValue) -> Result<()> {
    match value {
        AnyValue::Null => {}
        AnyValue::Boolean(v) => {
            worksheet.write_boolean(row, col, *v)?;
        }
        AnyValue::String(v) => {
            worksheet.write_string(row, col, *v)?;
        }
        AnyValue::StringOwned(v) => {
            worksheet.write_string(row, col, v.as_str())?;
        }
        AnyValue::Int8(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::Int16(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::Int32(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::Int64(v) => {
            if v.unsigned_abs() <= MAX_EXACT_F64_INT {
                worksheet.write_number(row, col, *v as f64)?;
            } else {
                worksheet.write_string(row, col, v.to_string())?;
            }
        }
        AnyValue::UInt8(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::UInt16(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::UInt32(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::UInt64(v) => {
            if *v <= MAX_EXACT_F64_INT {
                worksheet.write_number(row, col, *v as f64)?;
            } else {
                worksheet.write_string(row, col, v.to_string())?;
            }
        }
        AnyValue::Float32(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        AnyValue::Float64(v) => {
            worksheet.write_number(row, col, *v)?;
        }
        AnyValue::Date(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date");
            let date = epoch + chrono::Duration::days(*days as i64);
            worksheet.write_string(row, col, date.format("%Y-%m-%d").to_string())?;
        }
        AnyValue::Datetime(ts, unit, _) => {
            let micros = match unit {
                TimeUnit::Nanoseconds => ts / 1_000,
                TimeUnit::Microseconds => *ts,
                TimeUnit::Milliseconds => ts * 1_000,
            };
            let rendered = DateTime::from_timestamp_micros(micros)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .ok_or_else(|| eyre!("Datetime out of range: {}", ts))?;
            worksheet.write_string(row, col, rendered)?;
        }
        other => {
            worksheet.write_string(row, col, other.str_value().as_ref())?;
        }
    }
    Ok(())
}

/// Order-sensitive hash of column names and cell values.
pub fn content_hash(df: &DataFrame) -> u64 {
    let mut hasher = DefaultHasher::new();
    df.height().hash(&mut hasher);
    for column in df.get_columns() {
        column.name().as_str().hash(&mut hasher);
        let series = column.as_materialized_series();
        for value in series.iter() {
            // Debug form keeps Null distinct from the string "null".
            format!("{:?}", value).hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Memoized xlsx conversion keyed on [`content_hash`] of the table.
///
/// One entry: the pipeline recomputes in full per user action, so only the
/// latest output is worth keeping.
#[derive(Default)]
pub struct ExportCache {
    entry: Option<(u64, Vec<u8>)>,
    serializations: usize,
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized bytes for `df`, reusing the cached buffer when the content
    /// hash is unchanged.
    pub fn bytes_for(&mut self, df: &DataFrame) -> Result<&[u8]> {
        let hash = content_hash(df);
        let stale = !matches!(&self.entry, Some((cached, _)) if *cached == hash);
        if stale {
            let bytes = write_xlsx(df)?;
            self.entry = Some((hash, bytes));
            self.serializations += 1;
        }
        match &self.entry {
            Some((_, bytes)) => Ok(bytes),
            None => Err(eyre!("export cache entry missing after fill")),
        }
    }

    /// Number of real serializations performed (cache misses).
    pub fn serializations(&self) -> usize {
        self.serializations
    }
}
