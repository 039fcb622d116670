//! Snapshot ingest and pivot.
//!
//! This module turns a directory of per-timestamp snapshot CSVs into one wide
//! table (one row per snapshot, one column per road id).
//!
//! Design goals:
//! - **Strict file names**: every file must encode its timestamp, otherwise the
//!   whole run fails (there is no sensible per-file recovery)
//! - **Row-level filtering**: rows without a road name are dropped and counted
//! - **Deterministic order**: snapshots are sorted by timestamp, ties by file name
//! - **Separation of concerns**: no feature or training logic here

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::domain::{IngestConfig, Snapshot, WideRow, WideTable};
use crate::error::AppError;

pub const SNAPSHOT_PREFIX: &str = "estat_traf";
pub const SNAPSHOT_SUFFIX: &str = ".csv";
pub const SNAPSHOT_DATE_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

const COL_NAME: &str = "denominació / denominación";
const COL_GID: &str = "gid";
const COL_STATUS: &str = "estat / estado";

/// Ingest output: the pivoted table plus counters for the run summary.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub table: WideTable,
    pub files_read: usize,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

/// Read every snapshot under `config.data_dir` and pivot them.
///
/// The output file may live inside the snapshot directory; it is skipped.
pub fn load_wide_table(config: &IngestConfig) -> Result<IngestedData, AppError> {
    if same_path(&config.output, &config.data_dir) {
        return Err(AppError::input(format!(
            "Output '{}' is the snapshot directory itself.",
            config.output.display()
        )));
    }

    let snapshots = load_snapshots(&config.data_dir, Some(&config.output))?;
    let rows_read = snapshots.iter().map(|s| s.rows_read).sum();
    let rows_dropped = snapshots.iter().map(|s| s.rows_dropped).sum();
    let files_read = snapshots.len();
    let table = pivot(&snapshots);

    tracing::info!(
        files = files_read,
        roads = table.road_ids.len(),
        rows_dropped,
        "pivoted snapshots"
    );

    Ok(IngestedData {
        table,
        files_read,
        rows_read,
        rows_dropped,
    })
}

/// Parse the timestamp encoded in a snapshot file name.
pub fn parse_snapshot_timestamp(file_name: &str) -> Result<NaiveDateTime, AppError> {
    let stem = file_name
        .strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|s| s.strip_suffix(SNAPSHOT_SUFFIX))
        .ok_or_else(|| {
            AppError::input(format!(
                "Unexpected snapshot file name '{file_name}'. Expected '{SNAPSHOT_PREFIX}DD-MM-YYYY_HH-MM-SS{SNAPSHOT_SUFFIX}'."
            ))
        })?;

    NaiveDateTime::parse_from_str(stem, SNAPSHOT_DATE_FORMAT).map_err(|e| {
        AppError::input(format!(
            "Invalid timestamp '{stem}' in snapshot file name '{file_name}': {e}"
        ))
    })
}

/// Load all snapshots from a directory, sorted by timestamp then file name.
///
/// `skip` names a file in the directory that is not a snapshot (the wide CSV
/// written by a previous run).
pub fn load_snapshots(dir: &Path, skip: Option<&Path>) -> Result<Vec<Snapshot>, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::input(format!("Failed to read snapshot directory '{}': {e}", dir.display()))
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::input(format!("Failed to list snapshot directory '{}': {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if skip.is_some_and(|skip| same_path(&path, skip)) {
            tracing::debug!(path = %path.display(), "skipping wide CSV in snapshot directory");
            continue;
        }
        files.push(path);
    }

    if files.is_empty() {
        return Err(AppError::no_data(format!(
            "No snapshot files found in '{}'.",
            dir.display()
        )));
    }

    let mut snapshots = Vec::with_capacity(files.len());
    for path in files {
        snapshots.push(read_snapshot(&path)?);
    }

    snapshots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.source.cmp(&b.source)));
    Ok(snapshots)
}

/// Read one snapshot file. The timestamp comes from the file name.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, AppError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::input(format!("Unreadable snapshot file name '{}'.", path.display())))?;
    let timestamp = parse_snapshot_timestamp(file_name)?;

    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open snapshot '{}': {e}", path.display())))?;

    let snapshot = read_snapshot_from(file, timestamp, path.to_path_buf())?;
    tracing::debug!(
        file = %path.display(),
        roads = snapshot.statuses.len(),
        dropped = snapshot.rows_dropped,
        "read snapshot"
    );
    Ok(snapshot)
}

/// Parse snapshot rows from any reader.
pub fn read_snapshot_from<R: Read>(
    reader: R,
    timestamp: NaiveDateTime,
    source: PathBuf,
) -> Result<Snapshot, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read headers of '{}': {e}", source.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    for column in [COL_NAME, COL_GID, COL_STATUS] {
        if !header_map.contains_key(column) {
            return Err(AppError::input(format!(
                "Snapshot '{}' is missing required column `{column}`.",
                source.display()
            )));
        }
    }

    let mut statuses: Vec<(String, Option<i64>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows_read = 0usize;
    let mut rows_dropped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = result.map_err(|e| {
            AppError::input(format!("CSV parse error in '{}' line {line}: {e}", source.display()))
        })?;

        if get_optional(&record, &header_map, COL_NAME).is_none() {
            rows_dropped += 1;
            continue;
        }

        let Some(gid) = get_optional(&record, &header_map, COL_GID) else {
            tracing::warn!(file = %source.display(), line, "row without gid skipped");
            rows_dropped += 1;
            continue;
        };
        let status = parse_status(get_optional(&record, &header_map, COL_STATUS));

        match positions.get(gid) {
            Some(&pos) => statuses[pos].1 = status,
            None => {
                positions.insert(gid.to_string(), statuses.len());
                statuses.push((gid.to_string(), status));
            }
        }
    }

    Ok(Snapshot {
        timestamp,
        source,
        statuses,
        rows_read,
        rows_dropped,
    })
}

/// Pivot snapshots into a wide table.
///
/// Columns are the union of road ids in order of first appearance; a road
/// missing from a snapshot is `None` in that row.
pub fn pivot(snapshots: &[Snapshot]) -> WideTable {
    let mut road_ids: Vec<String> = Vec::new();
    let mut columns: HashMap<&str, usize> = HashMap::new();

    for snapshot in snapshots {
        for (gid, _) in &snapshot.statuses {
            if !columns.contains_key(gid.as_str()) {
                columns.insert(gid.as_str(), road_ids.len());
                road_ids.push(gid.clone());
            }
        }
    }

    let rows = snapshots
        .iter()
        .map(|snapshot| {
            let mut statuses = vec![None; road_ids.len()];
            for (gid, status) in &snapshot.statuses {
                statuses[columns[gid.as_str()]] = *status;
            }
            WideRow {
                timestamp: snapshot.timestamp,
                statuses,
            }
        })
        .collect();

    WideTable { road_ids, rows }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Exports from spreadsheet tools sometimes carry a BOM on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

/// Whether two paths name the same file, resolving links and `..` when both exist.
fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_status(s: Option<&str>) -> Option<i64> {
    let s = s?;
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    // Some exports write integral codes as floats ("1.0").
    // `i64::MAX as f64` rounds up to 2^63, hence the strict upper bound.
    let in_range = |v: f64| v >= i64::MIN as f64 && v < i64::MAX as f64;
    match s.parse::<f64>() {
        Ok(v) if in_range(v) && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}
