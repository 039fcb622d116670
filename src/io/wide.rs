//! Read/write the wide CSV (`timestamp` + one column per road id).
//!
//! Nulls are written as empty cells. Timestamps are written as
//! `YYYY-MM-DDTHH:MM:SS`; the reader also accepts a space separator and
//! fractional seconds.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::{WideRow, WideTable};
use crate::error::AppError;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the accepted formats.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, AppError> {
    let s = s.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    Err(AppError::input(format!(
        "Invalid timestamp '{s}'. Expected YYYY-MM-DDTHH:MM[:SS]."
    )))
}

/// Write the wide table to `path`, creating parent directories.
pub fn write_wide_csv(path: &Path, table: &WideTable) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::input(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create wide CSV '{}': {e}", path.display())))?;
    write_wide_to(file, table)
}

pub fn write_wide_to<W: Write>(writer: W, table: &WideTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.road_ids.len() + 1);
    header.push(TIMESTAMP_COLUMN);
    header.extend(table.road_ids.iter().map(String::as_str));
    writer
        .write_record(&header)
        .map_err(|e| AppError::input(format!("Failed to write wide CSV header: {e}")))?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.statuses.len() + 1);
        record.push(row.timestamp.format(TIMESTAMP_FORMAT).to_string());
        record.extend(
            row.statuses
                .iter()
                .map(|s| s.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .map_err(|e| AppError::input(format!("Failed to write wide CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush wide CSV: {e}")))?;
    Ok(())
}

/// Read a wide table previously written by `write_wide_csv`.
pub fn read_wide_csv(path: &Path) -> Result<WideTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open wide CSV '{}': {e}", path.display())))?;
    read_wide_from(file)
}

pub fn read_wide_from<R: Read>(reader: R) -> Result<WideTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read wide CSV headers: {e}")))?
        .clone();

    let ts_idx = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == TIMESTAMP_COLUMN)
        .ok_or_else(|| AppError::input("Wide CSV is missing the `timestamp` column."))?;

    let road_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != ts_idx)
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::input(format!("Wide CSV parse error at line {line}: {e}")))?;

        let timestamp = parse_timestamp(record.get(ts_idx).unwrap_or_default())
            .map_err(|e| AppError::input(format!("Line {line}: {e}")))?;

        let mut statuses = Vec::with_capacity(road_cols.len());
        for (col, road_id) in &road_cols {
            let cell = record.get(*col).unwrap_or_default();
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<i64>().map_err(|_| {
                    AppError::input(format!(
                        "Line {line}: invalid status '{cell}' for road `{road_id}`."
                    ))
                })?)
            };
            statuses.push(value);
        }

        rows.push(WideRow { timestamp, statuses });
    }

    Ok(WideTable {
        road_ids: road_cols.into_iter().map(|(_, name)| name).collect(),
        rows,
    })
}
