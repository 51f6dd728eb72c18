//! SSL-inspection spreadsheet adapter
//!
//! Reads a CSV export of an SSL-inspection log, resolves every cell in its
//! address column through one engine run, and writes the resolution back as
//! extra columns on the same rows. All other columns pass through untouched,
//! and the file is replaced atomically. Re-running over an already annotated
//! sheet overwrites the previous annotation instead of appending again.

use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;

use super::export::csv_escape;
use super::resolve::rdap::RirLookup;
use super::resolve::reverse::ReverseLookup;
use super::resolve::{FailureReason, Outcome, ResolveLens, RunStats, TokenResolution};
use crate::cache::write_atomic;

/// Columns appended to each row by the annotation pass
const APPENDED_COLUMNS: [&str; 7] = [
    "rir_name",
    "rir_description",
    "rir_cidr",
    "rir_country",
    "rir_registry",
    "rdns_fqdn",
    "resolution",
];

/// Marker written into the `resolution` column when the registry lookup failed
const NOT_FOUND_MARKER: &str = "NOT FOUND";

/// What one annotation pass did, plus the engine counters for the run.
#[derive(Debug, Clone, Copy)]
pub struct SheetSummary {
    /// Data rows in the sheet
    pub rows: usize,
    /// Rows carrying an address token
    pub addresses: usize,
    /// Rows annotated with a resolved record
    pub annotated: usize,
    pub stats: RunStats,
}

/// Annotate the spreadsheet at `path` in place.
///
/// The address column is `column` when given (matched against the header
/// row), otherwise the first column whose cells look like addresses.
pub fn annotate_sheet<R: RirLookup, P: ReverseLookup>(
    path: &Path,
    lens: &mut ResolveLens<R, P>,
    column: Option<&str>,
) -> Result<SheetSummary> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read spreadsheet {:?}: {}", path, e))?;

    let mut rows: Vec<Vec<String>> = content.lines().map(split_csv_line).collect();
    if rows.len() < 2 {
        return Err(anyhow!("spreadsheet {:?} has no data rows", path));
    }

    // Columns from a previous annotation pass get overwritten, not stacked.
    let base_len = rows[0]
        .iter()
        .position(|h| h == APPENDED_COLUMNS[0])
        .unwrap_or(rows[0].len());

    let addr_col = match column {
        Some(name) => rows[0][..base_len]
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("spreadsheet has no column named {:?}", name))?,
        None => detect_address_column(&rows[1..], base_len)
            .ok_or_else(|| anyhow!("no address column detected in {:?}", path))?,
    };

    // One engine run over every token in the sheet.
    let mut token_rows: Vec<usize> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        if let Some(cell) = row.get(addr_col) {
            if looks_like_address(cell.trim()) {
                token_rows.push(idx);
                tokens.push(cell.trim().to_string());
            }
        }
    }

    let (resolution, stats) = lens.resolve_batch(&tokens);

    let mut annotated = 0;
    let mut results = token_rows.iter().zip(resolution.records());

    let data_rows = rows.len() - 1;
    let addresses = tokens.len();

    let mut next = results.next();
    for (idx, row) in rows.iter_mut().enumerate() {
        row.truncate(base_len);
        if idx == 0 {
            row.extend(APPENDED_COLUMNS.iter().map(|c| c.to_string()));
            continue;
        }

        match next {
            Some((&row_idx, record)) if row_idx == idx => {
                let (values, resolved) = annotation_values(record);
                if resolved {
                    annotated += 1;
                }
                row.extend(values);
                next = results.next();
            }
            _ => row.extend(std::iter::repeat(String::new()).take(APPENDED_COLUMNS.len())),
        }
    }

    let mut output = String::new();
    for row in &rows {
        let line: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        output.push_str(&line.join(","));
        output.push('\n');
    }

    write_atomic(path, output.as_bytes())
        .map_err(|e| anyhow!("Failed to rewrite spreadsheet {:?}: {}", path, e))?;

    Ok(SheetSummary {
        rows: data_rows,
        addresses,
        annotated,
        stats,
    })
}

fn annotation_values(record: &TokenResolution) -> (Vec<String>, bool) {
    match &record.outcome {
        Outcome::Resolved(net) => (
            vec![
                net.name.clone(),
                net.description.clone(),
                net.cidr.clone(),
                net.country.clone(),
                net.registry.clone(),
                net.fqdn.clone().unwrap_or_default(),
                "resolved".to_string(),
            ],
            true,
        ),
        Outcome::Unresolved(reason) => {
            let marker = match reason {
                FailureReason::InvalidAddress => "invalid".to_string(),
                FailureReason::LookupFailure(_) => NOT_FOUND_MARKER.to_string(),
            };
            let mut values = vec![String::new(); APPENDED_COLUMNS.len() - 1];
            values.push(marker);
            (values, false)
        }
    }
}

/// Column with the most address-looking cells. Columns may mix addresses
/// with hostnames or labels; rows without an address simply pass through.
fn detect_address_column(data_rows: &[Vec<String>], base_len: usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for col in 0..base_len {
        let count = data_rows
            .iter()
            .filter(|row| {
                row.get(col)
                    .map(|cell| looks_like_address(cell.trim()))
                    .unwrap_or(false)
            })
            .count();
        if count > 0 && best.map_or(true, |(top, _)| count > top) {
            best = Some((count, col));
        }
    }
    best.map(|(_, col)| col)
}

/// Rough filter for cells that resemble IPs or subnets; the normalizer makes
/// the real call.
fn looks_like_address(cell: &str) -> bool {
    !cell.is_empty()
        && cell.contains('.')
        && cell
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '/')
}

/// Split one CSV line, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
