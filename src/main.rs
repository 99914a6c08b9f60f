use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::fs;

use sizemelt::cli::Args;
use sizemelt::error_display::user_message_from_io;
use sizemelt::export::ExportCache;
use sizemelt::{run_pipeline, workbook};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.list_sheets {
        for name in workbook::sheet_names(&args.path)? {
            println!("{}", name);
        }
        return Ok(());
    }

    let spec = args.reshape_spec()?;
    let output_df = run_pipeline(
        &args.path,
        args.sheet.as_deref(),
        &spec,
        args.sort_by.as_deref(),
    )?;

    if args.preview > 0 {
        println!("{}", output_df.head(Some(args.preview)));
    }

    // Serialize first, write only on full success: no partial output file.
    let mut cache = ExportCache::new();
    let bytes = cache.bytes_for(&output_df)?;
    fs::write(&args.output, bytes).map_err(|e| {
        eyre!(
            "{}",
            user_message_from_io(&e, Some(&args.output.display().to_string()))
        )
    })?;
    println!(
        "Wrote {} rows to {}",
        output_df.height(),
        args.output.display()
    );
    Ok(())
}
