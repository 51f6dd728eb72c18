use clap::Args;
use serde_json::json;
use spyglass::{annotate_sheet, NetworkCache, ResolveLens, SpyglassConfig};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the Sheet command
#[derive(Args)]
pub struct SheetArgs {
    /// SSL-inspection spreadsheet (CSV); the newest .csv file in the working
    /// directory is used when omitted
    #[clap(name = "FILE")]
    pub file: Option<PathBuf>,

    /// Header name of the address column; auto-detected when omitted
    #[clap(short = 'n', long)]
    pub column: Option<String>,
}

pub fn run(config: &SpyglassConfig, args: SheetArgs, json_output: bool) {
    let file = match args.file.or_else(|| super::latest_file(".", "csv")) {
        Some(file) => file,
        None => {
            eprintln!("ERROR: no .csv file found in the working directory and no file given");
            std::process::exit(1);
        }
    };

    info!("resolving IPs from SSL-inspection spreadsheet {:?}", file);

    let cache = NetworkCache::load(&config.cache_file);
    let mut lens = ResolveLens::new(cache, config);

    let summary = match annotate_sheet(&file, &mut lens, args.column.as_deref()) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    if json_output {
        let value = json!({
            "file": file,
            "rows": summary.rows,
            "addresses": summary.addresses,
            "annotated": summary.annotated,
            "stats": summary.stats,
        });
        match serde_json::to_string_pretty(&value) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("ERROR: {e}"),
        }
    } else {
        println!(
            "annotated {} of {} address rows ({} rows total) in {:?}",
            summary.annotated, summary.addresses, summary.rows, file
        );
        println!("{}", summary.stats);
    }
}
