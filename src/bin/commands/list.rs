use clap::Args;
use spyglass::{
    export_csv_file, export_json, export_json_file, NetworkCache, ResolveLens, SpyglassConfig,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for the List command
#[derive(Args)]
pub struct ListArgs {
    /// File with one IP address or network per line; the newest .txt file in
    /// the working directory is used when omitted
    #[clap(name = "FILE")]
    pub file: Option<PathBuf>,

    /// Export resolved records to a JSON file
    #[clap(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "out.json")]
    pub json_export: Option<PathBuf>,

    /// Export resolved records to a CSV file
    #[clap(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "out.csv")]
    pub csv_export: Option<PathBuf>,
}

pub fn run(config: &SpyglassConfig, args: ListArgs, json_output: bool) {
    let file = match args.file.or_else(|| super::latest_file(".", "txt")) {
        Some(file) => file,
        None => {
            eprintln!("ERROR: no .txt file found in the working directory and no file given");
            std::process::exit(1);
        }
    };

    info!("resolving IPs from text file {:?}", file);

    let tokens = match read_tokens(&file) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("ERROR: unable to read {:?}: {e}", file);
            std::process::exit(1);
        }
    };

    let cache = NetworkCache::load(&config.cache_file);
    let mut lens = ResolveLens::new(cache, config);
    let (resolution, stats) = lens.resolve_batch(&tokens);

    if let Some(path) = &args.json_export {
        info!("saving resolved records to JSON {:?}", path);
        if let Err(e) = export_json_file(&resolution, path) {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }

    if let Some(path) = &args.csv_export {
        info!("saving resolved records to CSV {:?}", path);
        if let Err(e) = export_csv_file(&resolution, path) {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }

    if json_output {
        if let Err(e) = export_json(&resolution, std::io::stdout()) {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
        println!();
    } else {
        println!("{}", stats);
    }
}

/// One token per line; blank lines and `#` comments are skipped.
fn read_tokens(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
