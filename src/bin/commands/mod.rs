pub mod cache;
pub mod list;
pub mod lookup;
pub mod sheet;

use std::path::PathBuf;
use std::time::SystemTime;

/// Newest file with the given extension in `dir`, for the "run against the
/// latest export" default of the list and sheet commands.
pub(crate) fn latest_file(dir: &str, extension: &str) -> Option<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map_or(true, |e| e != extension) {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        match &newest {
            Some((best, _)) if *best >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }

    newest.map(|(_, path)| path)
}
