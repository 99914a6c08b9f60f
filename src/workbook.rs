//! Excel input: a calamine workbook becomes a Polars [`DataFrame`].
//!
//! The whole sheet is read eagerly. The first row is the header; every other
//! row is data. Column types are inferred per column so numbers, booleans and
//! dates survive the trip instead of being stringified.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::{eyre::eyre, Result};
use polars::prelude::*;

/// Inferred type for an Excel column (preserves numbers, bools, dates; avoids stringifying).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

/// Sheet names in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one sheet into a DataFrame.
///
/// `sheet` is a 0-based index or a sheet name; `None` selects the first
/// sheet. An empty sheet yields an empty DataFrame.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    if workbook.sheet_names().is_empty() {
        return Err(eyre!("Excel file has no worksheets"));
    }
    let range = if let Some(sel) = sheet {
        if let Ok(idx) = sel.parse::<usize>() {
            workbook
                .worksheet_range_at(idx)
                .ok_or_else(|| eyre!("Excel: no sheet at index {}", idx))?
                .map_err(|e| eyre!("Excel: {}", e))?
        } else {
            workbook
                .worksheet_range(sel)
                .map_err(|e| eyre!("Excel: {}", e))?
        }
    } else {
        workbook
            .worksheet_range_at(0)
            .ok_or_else(|| eyre!("Excel: no first sheet"))?
            .map_err(|e| eyre!("Excel: {}", e))?
    };

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    if rows.is_empty() {
        return Ok(DataFrame::new(vec![])?);
    }
    let headers: Vec<String> = rows[0]
        .iter()
        .map(|c| calamine::DataType::as_string(c).unwrap_or_else(|| c.to_string()))
        .collect();
    let mut columns = Vec::with_capacity(headers.len());
    for (col_idx, header) in headers.iter().enumerate() {
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(col_idx)).collect();
        let name = if header.is_empty() {
            format!("column_{}", col_idx + 1)
        } else {
            header.clone()
        };
        let series = column_to_series(&name, &cells, infer_column_type(&cells))?;
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Infers a column type: prefers Int64 for whole-number floats; infers
/// Date/Datetime for Excel date cells or for string columns whose every
/// non-empty cell parses as ISO date/datetime.
fn infer_column_type(cells: &[Option<&Data>]) -> ColType {
    use calamine::DataType as CalamineTrait;
    let mut has_string = false;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if CalamineTrait::is_string(*cell) {
            has_string = true;
            break;
        }
        if CalamineTrait::is_float(*cell)
            || CalamineTrait::is_datetime(*cell)
            || CalamineTrait::is_datetime_iso(*cell)
        {
            has_float = true;
        }
        if CalamineTrait::is_int(*cell) {
            has_int = true;
        }
        if CalamineTrait::is_bool(*cell) {
            has_bool = true;
        }
        if CalamineTrait::is_datetime(*cell) || CalamineTrait::is_datetime_iso(*cell) {
            has_datetime = true;
        }
    }
    if has_string {
        let any_parsed = cells
            .iter()
            .flatten()
            .any(|c| cell_to_naive_datetime(c).is_some());
        let all_non_empty_parse = cells
            .iter()
            .flatten()
            .all(|c| CalamineTrait::is_empty(*c) || cell_to_naive_datetime(c).is_some());
        if any_parsed && all_non_empty_parse {
            if parsed_cells_all_midnight(cells) {
                ColType::Date
            } else {
                ColType::Datetime
            }
        } else {
            ColType::Utf8
        }
    } else if has_int {
        ColType::Int64
    } else if has_datetime {
        if parsed_cells_all_midnight(cells) {
            ColType::Date
        } else {
            ColType::Datetime
        }
    } else if has_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            calamine::DataType::as_f64(*cell)
                .is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            ColType::Int64
        } else {
            ColType::Float64
        }
    } else if has_bool {
        ColType::Boolean
    } else {
        ColType::Utf8
    }
}

/// True if every cell that parses as datetime has time 00:00:00.
fn parsed_cells_all_midnight(cells: &[Option<&Data>]) -> bool {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("valid time");
    cells
        .iter()
        .flatten()
        .filter_map(|c| cell_to_naive_datetime(c))
        .all(|dt| dt.time() == midnight)
}

/// Converts a calamine cell to NaiveDateTime (Excel serial, DateTimeIso, or parseable string).
fn cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_naive_datetime_str(s)
}

/// Parses an ISO-style date/datetime string; tries FORMATS in order.
fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0).expect("midnight"));
    }
    None
}

/// Build a Polars Series from a column of calamine cells using the inferred type.
fn column_to_series(name: &str, cells: &[Option<&Data>], col_type: ColType) -> Result<Series> {
    use calamine::DataType as CalamineTrait;
    use polars::datatypes::TimeUnit;
    let series = match col_type {
        ColType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        ColType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        ColType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        ColType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_string()))
                .collect();
            Series::new(name.into(), v)
        }
        ColType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date");
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| (dt.date() - epoch).num_days() as i32)
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        ColType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(data: &[Data]) -> Vec<Option<&Data>> {
        data.iter().map(Some).collect()
    }

    #[test]
    fn infer_whole_number_floats_as_int() {
        let data = vec![Data::Float(2.0), Data::Float(5.0), Data::Empty];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Int64);
    }

    #[test]
    fn infer_fractional_floats_as_float() {
        let data = vec![Data::Float(2.5), Data::Float(5.0)];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Float64);
    }

    #[test]
    fn infer_mixed_string_column_as_utf8() {
        let data = vec![Data::String("Shirt".into()), Data::Float(1.0)];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Utf8);
    }

    #[test]
    fn infer_iso_date_strings_as_date() {
        let data = vec![
            Data::String("2024-01-02".into()),
            Data::String("2024-03-04".into()),
        ];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Date);
    }

    #[test]
    fn infer_iso_datetime_strings_as_datetime() {
        let data = vec![Data::String("2024-01-02 10:30:00".into())];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Datetime);
    }

    #[test]
    fn infer_bool_column() {
        let data = vec![Data::Bool(true), Data::Bool(false)];
        assert_eq!(infer_column_type(&cells(&data)), ColType::Boolean);
    }

    #[test]
    fn parse_datetime_str_formats() {
        assert!(parse_naive_datetime_str("2024-01-02").is_some());
        assert!(parse_naive_datetime_str("2024-01-02T10:11:12").is_some());
        assert!(parse_naive_datetime_str("2024-01-02 10:11:12.5").is_some());
        assert!(parse_naive_datetime_str("not a date").is_none());
        assert!(parse_naive_datetime_str("").is_none());
    }

    #[test]
    fn utf8_column_keeps_nulls() {
        let data = vec![Data::String("a".into()), Data::Empty];
        let s = column_to_series("c", &cells(&data), ColType::Utf8).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.null_count(), 1);
    }

    #[test]
    fn int_column_from_floats() {
        let data = vec![Data::Float(2.0), Data::Empty, Data::Float(5.0)];
        let s = column_to_series("c", &cells(&data), ColType::Int64).unwrap();
        assert_eq!(s.i64().unwrap().get(0), Some(2));
        assert_eq!(s.i64().unwrap().get(1), None);
        assert_eq!(s.i64().unwrap().get(2), Some(5));
    }

    #[test]
    fn empty_header_cells_get_positional_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("headers.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        // Header cell B1 is left blank.
        ws.write_string(0, 0, "Product").unwrap();
        ws.write_string(0, 2, "4").unwrap();
        ws.write_string(1, 0, "Boot").unwrap();
        ws.write_number(1, 1, 7).unwrap();
        ws.write_number(1, 2, 3).unwrap();
        wb.save(&path).unwrap();

        let df = read_sheet(&path, None).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["Product", "column_2", "4"]);
    }

    #[test]
    fn empty_sheet_yields_empty_dataframe() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        wb.add_worksheet();
        wb.save(&path).unwrap();

        let df = read_sheet(&path, None).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 0);
    }
}
