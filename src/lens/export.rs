//! Flat-record export
//!
//! Projects a finished [`Resolution`] onto a flat list of records, one per
//! input token, for JSON and CSV consumers. Unresolved tokens are exported
//! too, with their failure reason, so the output always covers the whole
//! input.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::resolve::{Outcome, Resolution, TokenResolution};

/// Column order of the CSV export
pub const EXPORT_COLUMNS: [&str; 9] = [
    "address",
    "status",
    "name",
    "description",
    "cidr",
    "country",
    "registry",
    "fqdn",
    "last_resolved",
];

/// Flat JSON object for one record, shared by the JSON export and the CLI's
/// single-record display.
pub fn record_to_json(record: &TokenResolution) -> Value {
    match &record.outcome {
        Outcome::Resolved(net) => json!({
            "address": record.token,
            "status": "resolved",
            "name": net.name,
            "description": net.description,
            "cidr": net.cidr,
            "country": net.country,
            "registry": net.registry,
            "fqdn": net.fqdn,
            "last_resolved": net.last_resolved.to_rfc3339(),
        }),
        Outcome::Unresolved(reason) => json!({
            "address": record.token,
            "status": "unresolved",
            "reason": reason.to_string(),
        }),
    }
}

fn record_row(record: &TokenResolution) -> Vec<String> {
    match &record.outcome {
        Outcome::Resolved(net) => vec![
            record.token.clone(),
            "resolved".to_string(),
            net.name.clone(),
            net.description.clone(),
            net.cidr.clone(),
            net.country.clone(),
            net.registry.clone(),
            net.fqdn.clone().unwrap_or_default(),
            net.last_resolved.to_rfc3339(),
        ],
        Outcome::Unresolved(reason) => vec![
            record.token.clone(),
            reason.to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

/// Serialize the resolution as a pretty-printed JSON array.
pub fn export_json<W: Write>(resolution: &Resolution, writer: W) -> Result<()> {
    let records: Vec<Value> = resolution.records().iter().map(record_to_json).collect();
    serde_json::to_writer_pretty(writer, &records)
        .map_err(|e| anyhow!("Failed to write JSON export: {}", e))
}

pub fn export_json_file(resolution: &Resolution, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .map_err(|e| anyhow!("Failed to create export file {:?}: {}", path, e))?;
    export_json(resolution, file)
}

/// Render the resolution as CSV with a header row.
pub fn export_csv_string(resolution: &Resolution) -> String {
    let mut out = String::new();
    out.push_str(&EXPORT_COLUMNS.join(","));
    out.push('\n');
    for record in resolution.records() {
        let row: Vec<String> = record_row(record).iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn export_csv_file(resolution: &Resolution, path: &Path) -> Result<()> {
    fs::write(path, export_csv_string(resolution))
        .map_err(|e| anyhow!("Failed to write export file {:?}: {}", path, e))
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
