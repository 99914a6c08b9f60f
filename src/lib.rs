//! Reshape wide size-per-column spreadsheets into long format.
//!
//! One row per product with one column per size label goes in; one row per
//! product-size pair comes out, null quantities and empty identifier rows
//! pruned, sorted by a chosen column, written back as a single-sheet xlsx
//! workbook.

pub mod cli;
pub mod error_display;
pub mod export;
pub mod reshape;
pub mod workbook;

use std::path::Path;

use color_eyre::{eyre::eyre, Result};
use polars::prelude::DataFrame;

use reshape::ReshapeSpec;

/// Load, reshape, and sort in one pass.
///
/// `sheet` and `sort_column` default to the first available option when
/// `None`, matching the selector defaults of the control surface.
pub fn run_pipeline(
    path: &Path,
    sheet: Option<&str>,
    spec: &ReshapeSpec,
    sort_column: Option<&str>,
) -> Result<DataFrame> {
    let df = workbook::read_sheet(path, sheet)?;
    let reshaped = reshape::reshape(&df, spec)?;
    let sort_column = match sort_column {
        Some(c) => c.to_string(),
        None => reshaped
            .get_column_names()
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| eyre!("Reshaped output has no columns"))?,
    };
    reshape::sort_by(&reshaped, &sort_column)
}
