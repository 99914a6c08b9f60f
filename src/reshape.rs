//! Wide-to-long reshape: column partition, unpivot, null pruning, sort.
//!
//! The size columns are unpivoted into a label column and a value column
//! (default `Size` / `Quantity`); all remaining columns are carried as
//! identifiers on every emitted row.

use std::collections::HashSet;

use color_eyre::{eyre::eyre, Result};
use polars::prelude::*;
use regex::Regex;

use crate::error_display::user_message_from_polars;

/// How the size-column set is chosen from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSelector {
    /// Contiguous run of header labels, inclusive on both ends, in sheet order.
    Range { first: String, last: String },
    /// Columns whose name matches a regular expression.
    Pattern(String),
    /// Explicitly named columns.
    Explicit(Vec<String>),
}

/// Spec for one reshape pass.
#[derive(Debug, Clone)]
pub struct ReshapeSpec {
    pub selector: SizeSelector,
    /// Name of the emitted label column.
    pub size_name: String,
    /// Name of the emitted value column.
    pub quantity_name: String,
}

impl Default for ReshapeSpec {
    fn default() -> Self {
        Self {
            selector: SizeSelector::Range {
                first: "3.5".to_string(),
                last: "15".to_string(),
            },
            size_name: "Size".to_string(),
            quantity_name: "Quantity".to_string(),
        }
    }
}

/// Identifier vs size columns, both in sheet order. The two sets are disjoint
/// and together cover every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPartition {
    pub identifiers: Vec<String>,
    pub sizes: Vec<String>,
}

/// Split `names` into size columns (per `selector`) and identifiers.
pub fn partition_columns(names: &[String], selector: &SizeSelector) -> Result<ColumnPartition> {
    let sizes: Vec<String> = match selector {
        SizeSelector::Range { first, last } => {
            let start = names
                .iter()
                .position(|c| c == first)
                .ok_or_else(|| eyre!("Size range start '{}' is not a column", first))?;
            let end = names
                .iter()
                .position(|c| c == last)
                .ok_or_else(|| eyre!("Size range end '{}' is not a column", last))?;
            if end < start {
                return Err(eyre!(
                    "Size range is reversed: '{}' comes after '{}' in the sheet",
                    first,
                    last
                ));
            }
            names[start..=end].to_vec()
        }
        SizeSelector::Pattern(pattern) => {
            let re = Regex::new(pattern).map_err(|e| eyre!("Invalid size pattern: {}", e))?;
            let matched: Vec<String> = names.iter().filter(|c| re.is_match(c)).cloned().collect();
            if matched.is_empty() {
                return Err(eyre!("Size pattern '{}' matches no columns", pattern));
            }
            matched
        }
        SizeSelector::Explicit(chosen) => {
            if chosen.is_empty() {
                return Err(eyre!("No size columns given"));
            }
            for c in chosen {
                if !names.contains(c) {
                    return Err(eyre!("Size column '{}' is not a column", c));
                }
            }
            // keep sheet order, not argument order
            names
                .iter()
                .filter(|n| chosen.contains(n))
                .cloned()
                .collect()
        }
    };
    let size_set: HashSet<&str> = sizes.iter().map(|s| s.as_str()).collect();
    let identifiers: Vec<String> = names
        .iter()
        .filter(|n| !size_set.contains(n.as_str()))
        .cloned()
        .collect();
    if identifiers.is_empty() {
        return Err(eyre!(
            "Size columns cover the whole sheet; no identifier columns remain"
        ));
    }
    Ok(ColumnPartition { identifiers, sizes })
}

/// Unpivot the size columns into (`size_name`, `quantity_name`) rows, then
/// drop rows with a null quantity and rows whose identifier columns are all
/// null.
pub fn reshape(df: &DataFrame, spec: &ReshapeSpec) -> Result<DataFrame> {
    let size_name = spec.size_name.trim();
    let quantity_name = spec.quantity_name.trim();
    if size_name.is_empty() || quantity_name.is_empty() {
        return Err(eyre!("Size and quantity column names cannot be empty"));
    }
    if size_name == quantity_name {
        return Err(eyre!("Size and quantity column names must differ"));
    }

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let partition = partition_columns(&names, &spec.selector)?;
    for id in &partition.identifiers {
        if id == size_name || id == quantity_name {
            return Err(eyre!(
                "Output column name '{}' collides with an identifier column",
                id
            ));
        }
    }

    let on = cols(partition.sizes.iter().map(|s| s.as_str()));
    let index = cols(partition.identifiers.iter().map(|s| s.as_str()));
    let args = UnpivotArgsDSL {
        on,
        index,
        variable_name: Some(PlSmallStr::from(size_name)),
        value_name: Some(PlSmallStr::from(quantity_name)),
    };
    let mut lf = df.clone().lazy().unpivot(args);

    lf = lf.filter(col(quantity_name).is_not_null());

    let mut any_identifier_present = lit(false);
    for id in &partition.identifiers {
        any_identifier_present = any_identifier_present.or(col(id.as_str()).is_not_null());
    }
    lf = lf.filter(any_identifier_present);

    lf.collect()
        .map_err(|e| eyre!("{}", user_message_from_polars(&e)))
}

/// Stable ascending sort by one column; ties keep their pre-sort order and
/// null keys go last.
pub fn sort_by(df: &DataFrame, column: &str) -> Result<DataFrame> {
    if !df.get_column_names().iter().any(|n| n.as_str() == column) {
        return Err(eyre!(
            "Sort column '{}' does not exist in the reshaped output",
            column
        ));
    }
    let options = SortMultipleOptions {
        descending: vec![false],
        nulls_last: vec![true],
        maintain_order: true,
        ..Default::default()
    };
    df.clone()
        .lazy()
        .sort_by_exprs(vec![col(column)], options)
        .collect()
        .map_err(|e| eyre!("{}", user_message_from_polars(&e)))
}
