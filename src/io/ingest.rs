//! CSV ingest.
//!
//! Survey catalog exports start with a block of `#`-prefixed comment lines,
//! followed by a header and data rows. This module turns such a file into a
//! `RawTable`: a header list plus rows of optional, trimmed string cells.
//!
//! Design goals:
//! - **Comment-aware**: leading `#` lines are skipped before parsing
//! - **Strict first**: every record must match the header width
//! - **One documented fallback**: on a strict parse error, retry with flexible
//!   widths (short rows padded with nulls, extra cells dropped); if that also
//!   fails, the strict error is what the caller sees
//! - **Separation of concerns**: no feature or label logic here

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, warn};

use crate::error::AppError;

/// A source-native table. Column set is arbitrary; cells may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell lookup; out-of-range cells read as null.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Drop rows where every cell is null. Rows with partial data are kept;
    /// catalogs routinely leave individual fields empty.
    pub fn drop_all_null_rows(self) -> RawTable {
        let rows = self
            .rows
            .into_iter()
            .filter(|row| row.iter().any(Option::is_some))
            .collect();
        RawTable {
            headers: self.headers,
            rows,
        }
    }
}

/// Load a catalog CSV from disk.
pub fn load_csv(path: &Path) -> Result<RawTable, AppError> {
    let mut file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| AppError::input(format!("Failed to read CSV '{}': {e}", path.display())))?;

    parse_csv(&text).map_err(|e| AppError::input(format!("{}: {e}", path.display())))
}

/// Parse catalog CSV text (strict, then permissive fallback).
pub fn parse_csv(text: &str) -> Result<RawTable, AppError> {
    let body = strip_comment_lines(text);

    match parse_with(body, false) {
        Ok(table) => Ok(table),
        Err(strict_err) => {
            warn!("strict CSV parse failed ({strict_err}); retrying in permissive mode");
            match parse_with(body, true) {
                Ok(table) => Ok(table),
                Err(e) => {
                    debug!("permissive CSV parse also failed: {e}");
                    Err(strict_err)
                }
            }
        }
    }
}

/// Skip the leading `#` comment block (and blank lines inside it).
fn strip_comment_lines(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || trimmed.trim().is_empty() {
            offset += line.len();
        } else {
            break;
        }
    }
    &text[offset..]
}

fn parse_with(body: &str, flexible: bool) -> Result<RawTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(flexible)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(AppError::input("CSV has no header row."));
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1 and records are 1-based.
        let record = result
            .map_err(|e| AppError::input(format!("CSV parse error near data line {}: {e}", idx + 2)))?;
        rows.push(record_to_row(&record, width));
    }

    Ok(RawTable { headers, rows })
}

fn record_to_row(record: &StringRecord, width: usize) -> Vec<Option<String>> {
    (0..width)
        .map(|i| {
            record
                .get(i)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and friends sometimes emit a UTF-8 BOM on the first header.
    name.trim().trim_start_matches('\u{feff}').to_string()
}
