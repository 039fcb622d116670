//! Shared pipeline logic used by every subcommand.
//!
//! snapshots -> wide table -> wide CSV -> calendar features -> per-road models
//!
//! Each stage takes its inputs explicitly and returns its artifact, so the CLI
//! only deals with presentation.

use std::path::Path;

use crate::calendar::HolidayCalendar;
use crate::domain::{IngestConfig, TrainConfig, WideTable};
use crate::error::AppError;
use crate::features::derive_features;
use crate::fit::trainer::{TrainSummary, train_all};
use crate::io::ingest::{IngestedData, load_wide_table};
use crate::io::wide::{read_wide_csv, write_wide_csv};

/// Pivot the snapshot directory and write the wide CSV.
pub fn run_ingest(config: &IngestConfig) -> Result<IngestedData, AppError> {
    let ingest = load_wide_table(config)?;
    write_wide_csv(&config.output, &ingest.table)?;
    tracing::info!(path = %config.output.display(), rows = ingest.table.rows.len(), "wrote wide CSV");
    Ok(ingest)
}

/// Read the wide CSV and train every road.
pub fn run_train(wide_csv: &Path, config: &TrainConfig) -> Result<TrainSummary, AppError> {
    let wide = read_wide_csv(wide_csv)?;
    tracing::info!(
        path = %wide_csv.display(),
        rows = wide.rows.len(),
        roads = wide.road_ids.len(),
        "loaded wide CSV"
    );
    train_from_wide(&wide, config)
}

/// Derive features from an in-memory wide table and train every road.
pub fn train_from_wide(wide: &WideTable, config: &TrainConfig) -> Result<TrainSummary, AppError> {
    let mut calendar = HolidayCalendar::new(config.country);
    let table = derive_features(wide, &mut calendar)?;
    train_all(&table, config)
}
