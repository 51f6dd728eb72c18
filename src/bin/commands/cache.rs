use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use spyglass::{NetworkCache, SpyglassConfig};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache location, entry counts, and file size
    Info,

    /// Delete all cached entries
    Clear,
}

#[derive(Tabled)]
struct CacheInfoRow {
    path: String,
    entries: usize,
    stale: usize,
    size_bytes: u64,
    ttl_days: u64,
}

pub fn run(config: &SpyglassConfig, commands: CacheCommands, json_output: bool) {
    match commands {
        CacheCommands::Info => {
            let cache = NetworkCache::load(&config.cache_file);
            let stale = cache.stale_count(Utc::now(), config.cache_ttl());
            let size_bytes = std::fs::metadata(cache.path())
                .map(|m| m.len())
                .unwrap_or(0);

            if json_output {
                let value = json!({
                    "path": cache.path(),
                    "entries": cache.len(),
                    "stale": stale,
                    "size_bytes": size_bytes,
                    "ttl_days": config.cache_ttl_days,
                });
                match serde_json::to_string_pretty(&value) {
                    Ok(out) => println!("{}", out),
                    Err(e) => eprintln!("ERROR: {e}"),
                }
            } else {
                let row = CacheInfoRow {
                    path: cache.path().display().to_string(),
                    entries: cache.len(),
                    stale,
                    size_bytes,
                    ttl_days: config.cache_ttl_days,
                };
                println!("{}", Table::new(vec![row]).with(Style::rounded()));
            }
        }
        CacheCommands::Clear => {
            let mut cache = NetworkCache::load(&config.cache_file);
            let removed = cache.len();
            cache.clear();
            if let Err(e) = cache.save() {
                eprintln!("ERROR: unable to clear cache: {e}");
                std::process::exit(1);
            }
            println!("removed {} cached entries", removed);
        }
    }
}
