//! End-to-end checks: write a wide workbook to disk, run the full
//! read/reshape/sort pipeline on it, and read the exported bytes back.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use sizemelt::export::{self, ExportCache, OUTPUT_SHEET_NAME};
use sizemelt::reshape::{ReshapeSpec, SizeSelector};
use sizemelt::{run_pipeline, workbook};

fn spec(first: &str, last: &str) -> ReshapeSpec {
    ReshapeSpec {
        selector: SizeSelector::Range {
            first: first.to_string(),
            last: last.to_string(),
        },
        ..ReshapeSpec::default()
    }
}

/// Write a small wide-format workbook and return the temp dir holding it.
///
/// Layout (sheet "Inventory"):
///   Product | Color | 3.5 | 4  | 4.5
///   Boot    | Black | 12  |    | 7
///   Shoe    | Red   |     | 3  |
///           |       | 99  | 99 | 99   <- all identifiers empty
fn write_wide_workbook() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wide.xlsx");

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Inventory").unwrap();
    for (col, header) in ["Product", "Color", "3.5", "4", "4.5"].iter().enumerate() {
        ws.write_string(0, col as u16, *header).unwrap();
    }
    ws.write_string(1, 0, "Boot").unwrap();
    ws.write_string(1, 1, "Black").unwrap();
    ws.write_number(1, 2, 12).unwrap();
    ws.write_number(1, 4, 7).unwrap();
    ws.write_string(2, 0, "Shoe").unwrap();
    ws.write_string(2, 1, "Red").unwrap();
    ws.write_number(2, 3, 3).unwrap();
    ws.write_number(3, 2, 99).unwrap();
    ws.write_number(3, 3, 99).unwrap();
    ws.write_number(3, 4, 99).unwrap();
    wb.save(&path).unwrap();

    (dir, path)
}

#[test]
fn sheet_names_lists_every_sheet() {
    let (_dir, path) = write_wide_workbook();
    let names = workbook::sheet_names(&path).unwrap();
    assert_eq!(names, vec!["Inventory"]);
}

#[test]
fn pipeline_reshapes_and_prunes() {
    let (_dir, path) = write_wide_workbook();
    let out = run_pipeline(&path, None, &spec("3.5", "4.5"), None).unwrap();

    let names: Vec<String> = out
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, vec!["Product", "Color", "Size", "Quantity"]);

    // Boot has two quantities, Shoe one; the all-empty-identifier row and
    // every null quantity are gone.
    assert_eq!(out.height(), 3);
    let products: Vec<String> = (0..out.height())
        .map(|i| {
            out.column("Product")
                .unwrap()
                .get(i)
                .unwrap()
                .str_value()
                .to_string()
        })
        .collect();
    assert_eq!(products, vec!["Boot", "Boot", "Shoe"]);
}

#[test]
fn pipeline_sorts_by_requested_column() {
    let (_dir, path) = write_wide_workbook();
    let out = run_pipeline(&path, None, &spec("3.5", "4.5"), Some("Quantity")).unwrap();
    let quantities: Vec<i64> = out
        .column("Quantity")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(quantities, vec![3, 7, 12]);
}

#[test]
fn pipeline_selects_sheet_by_name_and_index() {
    let (_dir, path) = write_wide_workbook();
    let by_name = run_pipeline(&path, Some("Inventory"), &spec("3.5", "4.5"), None).unwrap();
    let by_index = run_pipeline(&path, Some("0"), &spec("3.5", "4.5"), None).unwrap();
    assert!(by_name.equals_missing(&by_index));
}

#[test]
fn pipeline_unknown_sheet_fails() {
    let (_dir, path) = write_wide_workbook();
    assert!(run_pipeline(&path, Some("Nope"), &spec("3.5", "4.5"), None).is_err());
}

#[test]
fn exported_bytes_round_trip() {
    let (_dir, path) = write_wide_workbook();
    let out = run_pipeline(&path, None, &spec("3.5", "4.5"), None).unwrap();
    let bytes = export::write_xlsx(&out).unwrap();

    let mut reader: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.sheet_names(), vec![OUTPUT_SHEET_NAME]);
    let range = reader.worksheet_range(OUTPUT_SHEET_NAME).unwrap();
    // Header plus three data rows.
    assert_eq!(range.height(), 4);
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("Product".into())));
    assert_eq!(range.get_value((1, 3)), Some(&Data::Float(12.0)));
}

#[test]
fn export_is_deterministic_across_pipeline_runs() {
    let (_dir, path) = write_wide_workbook();
    let first = run_pipeline(&path, None, &spec("3.5", "4.5"), None).unwrap();
    let second = run_pipeline(&path, None, &spec("3.5", "4.5"), None).unwrap();
    assert_eq!(
        export::write_xlsx(&first).unwrap(),
        export::write_xlsx(&second).unwrap()
    );
}

#[test]
fn cache_reuses_bytes_for_identical_output() {
    let (_dir, path) = write_wide_workbook();
    let out = run_pipeline(&path, None, &spec("3.5", "4.5"), None).unwrap();

    let mut cache = ExportCache::new();
    let first = cache.bytes_for(&out).unwrap().to_vec();
    let second = cache.bytes_for(&out).unwrap().to_vec();
    assert_eq!(first, second);
    assert_eq!(cache.serializations(), 1);

    // A different sort order is different content and must re-serialize.
    let resorted = run_pipeline(&path, None, &spec("3.5", "4.5"), Some("Quantity")).unwrap();
    cache.bytes_for(&resorted).unwrap();
    assert_eq!(cache.serializations(), 2);
}
