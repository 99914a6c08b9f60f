//! Command-line definitions for sizemelt.

use clap::Parser;
use std::path::PathBuf;

use crate::reshape::{ReshapeSpec, SizeSelector};
use color_eyre::{eyre::eyre, Result};

/// Command-line arguments for sizemelt
#[derive(Clone, Parser, Debug)]
#[command(
    name = "sizemelt",
    version,
    about = "Reshape wide size-per-column spreadsheets into long format"
)]
pub struct Args {
    /// Path to the spreadsheet to reshape (.xls, .xlsx, .xlsm, .xlsb)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Sheet to process: 0-based index (e.g. 0) or sheet name (e.g. "Sales").
    /// Defaults to the first sheet
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// List the sheet names in the input file and exit
    #[arg(long = "list-sheets", action)]
    pub list_sheets: bool,

    /// First size-column label of the contiguous range
    #[arg(long = "first-size", value_name = "LABEL", default_value = "3.5")]
    pub first_size: String,

    /// Last size-column label of the contiguous range
    #[arg(long = "last-size", value_name = "LABEL", default_value = "15")]
    pub last_size: String,

    /// Select size columns by regular expression instead of a label range
    #[arg(long = "size-pattern", value_name = "REGEX", conflicts_with = "size_columns")]
    pub size_pattern: Option<String>,

    /// Select a size column by name (repeatable) instead of a label range
    #[arg(long = "size-column", value_name = "COL")]
    pub size_columns: Vec<String>,

    /// Name for the emitted size-label column
    #[arg(long = "size-name", value_name = "NAME", default_value = "Size")]
    pub size_name: String,

    /// Name for the emitted quantity column
    #[arg(long = "quantity-name", value_name = "NAME", default_value = "Quantity")]
    pub quantity_name: String,

    /// Column to sort the output by, ascending. Defaults to the first output column
    #[arg(long = "sort-by", value_name = "COLUMN")]
    pub sort_by: Option<String>,

    /// Where to write the reshaped workbook
    #[arg(
        long = "output",
        short = 'o',
        value_name = "PATH",
        default_value = "Transformed_Size_Data.xlsx"
    )]
    pub output: PathBuf,

    /// Print the first N reshaped rows to stdout (0 disables)
    #[arg(long = "preview", value_name = "N", default_value_t = 5)]
    pub preview: usize,
}

impl Args {
    /// Build the reshape spec from the selector flags. Pattern and explicit
    /// selectors take precedence over the default label range.
    pub fn reshape_spec(&self) -> Result<ReshapeSpec> {
        let selector = if let Some(pattern) = &self.size_pattern {
            SizeSelector::Pattern(pattern.clone())
        } else if !self.size_columns.is_empty() {
            SizeSelector::Explicit(self.size_columns.clone())
        } else {
            if self.first_size.trim().is_empty() || self.last_size.trim().is_empty() {
                return Err(eyre!("Size range labels cannot be empty"));
            }
            SizeSelector::Range {
                first: self.first_size.clone(),
                last: self.last_size.clone(),
            }
        };
        Ok(ReshapeSpec {
            selector,
            size_name: self.size_name.clone(),
            quantity_name: self.quantity_name.clone(),
        })
    }
}
