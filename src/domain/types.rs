//! Shared domain types.
//!
//! These types flow through the whole pipeline:
//!
//! - snapshots read from disk (`Snapshot`)
//! - the pivoted per-road time series (`WideTable`)
//! - calendar features and the training table (`CalendarFeatures`, `FeatureTable`)
//! - persisted per-road models (`RoadModel`)

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::BoostedClassifier;

/// Names of the model input columns, in the order of `CalendarFeatures::model_input`.
pub const FEATURE_NAMES: [&str; 6] = ["year", "month", "day", "weekday", "is_business_day", "hour"];

/// Status code returned by prediction when no model exists for a road.
pub const MISSING_MODEL_STATUS: i64 = -1;

/// Country whose public holidays decide `is_business_day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Country {
    /// Spain, national holidays.
    Es,
    /// No public holidays: every Monday to Friday is a business day.
    #[serde(rename = "none")]
    #[value(name = "none")]
    NoHolidays,
}

/// Traffic condition class reported by the city feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficStatus {
    Fluid,
    Dense,
    Congested,
    Cut,
    NoData,
    UnderpassFluid,
    UnderpassDense,
    UnderpassCongested,
    UnderpassCut,
    UnderpassNoData,
}

impl TrafficStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        let status = match code {
            0 => TrafficStatus::Fluid,
            1 => TrafficStatus::Dense,
            2 => TrafficStatus::Congested,
            3 => TrafficStatus::Cut,
            4 => TrafficStatus::NoData,
            5 => TrafficStatus::UnderpassFluid,
            6 => TrafficStatus::UnderpassDense,
            7 => TrafficStatus::UnderpassCongested,
            8 => TrafficStatus::UnderpassCut,
            9 => TrafficStatus::UnderpassNoData,
            _ => return None,
        };
        Some(status)
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            TrafficStatus::Fluid => "fluid",
            TrafficStatus::Dense => "dense",
            TrafficStatus::Congested => "congested",
            TrafficStatus::Cut => "cut",
            TrafficStatus::NoData => "no data",
            TrafficStatus::UnderpassFluid => "underpass fluid",
            TrafficStatus::UnderpassDense => "underpass dense",
            TrafficStatus::UnderpassCongested => "underpass congested",
            TrafficStatus::UnderpassCut => "underpass cut",
            TrafficStatus::UnderpassNoData => "underpass no data",
        }
    }
}

/// Label for an arbitrary status code.
///
/// Unknown codes are logged and rendered with a neutral label.
pub fn status_label(code: i64) -> &'static str {
    if code == MISSING_MODEL_STATUS {
        return "no model";
    }
    match TrafficStatus::from_code(code) {
        Some(status) => status.display_name(),
        None => {
            tracing::warn!(code, "unrecognized traffic status code");
            "unknown"
        }
    }
}

/// One snapshot file: every road's status at a single point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub source: PathBuf,
    /// `(road_id, status)` in order of first appearance in the file.
    pub statuses: Vec<(String, Option<i64>)>,
    /// Data rows read from the file (before filtering).
    pub rows_read: usize,
    /// Rows dropped because the road name was empty.
    pub rows_dropped: usize,
}

/// One row of the wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub timestamp: NaiveDateTime,
    /// Aligned with `WideTable::road_ids`; `None` when the road was not reported.
    pub statuses: Vec<Option<i64>>,
}

/// One row per snapshot, one column per road id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    pub road_ids: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn column_index(&self, road_id: &str) -> Option<usize> {
        self.road_ids.iter().position(|id| id == road_id)
    }

    /// All values of one road column, in row order.
    pub fn column(&self, road_id: &str) -> Option<Vec<Option<i64>>> {
        let idx = self.column_index(road_id)?;
        Some(self.rows.iter().map(|r| r.statuses[idx]).collect())
    }
}

/// Calendar decomposition of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// ISO weekday, Monday = 1 .. Sunday = 7.
    pub weekday: u32,
    pub hour: u32,
    pub is_business_day: bool,
    /// ISO week number. Carried along but not a model input.
    pub week: u32,
}

impl CalendarFeatures {
    /// Model input vector, ordered as `FEATURE_NAMES`.
    pub fn model_input(&self) -> [f64; 6] {
        [
            self.year as f64,
            self.month as f64,
            self.day as f64,
            self.weekday as f64,
            if self.is_business_day { 1.0 } else { 0.0 },
            self.hour as f64,
        ]
    }
}

/// Training table: calendar features plus every road's status, no nulls.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub road_ids: Vec<String>,
    pub calendar: Vec<CalendarFeatures>,
    /// Row-major, aligned with `calendar` and `road_ids`.
    pub statuses: Vec<Vec<i64>>,
    /// Wide rows dropped because at least one road was null.
    pub rows_dropped: usize,
}

impl FeatureTable {
    pub fn n_rows(&self) -> usize {
        self.calendar.len()
    }

    /// Target column for one road.
    pub fn target(&self, road_idx: usize) -> Vec<i64> {
        self.statuses.iter().map(|row| row[road_idx]).collect()
    }
}

/// A persisted per-road model (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadModel {
    pub tool: String,
    pub road_id: String,
    pub features: Vec<String>,
    /// Holiday calendar used for `is_business_day` while training.
    pub country: Country,
    pub n_train: usize,
    pub n_test: usize,
    /// Rows excluded because their label occurred fewer than two times.
    pub rare_rows_dropped: usize,
    /// `(status, weight)` used as sample weights while fitting.
    pub class_weights: Vec<(i64, f64)>,
    pub classifier: BoostedClassifier,
}

impl RoadModel {
    pub fn predict(&self, features: &CalendarFeatures) -> i64 {
        self.classifier.predict(&features.model_input())
    }
}

/// Settings for the ingest/pivot stage.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub output: PathBuf,
}

/// Settings for the per-road training stage.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub models_dir: PathBuf,
    pub country: Country,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub n_rounds: usize,
    pub learning_rate: f64,
    /// Evaluate each model on its held-out split and print a report.
    pub eval: bool,
    /// Worker threads for the per-road loop (0 = one per core).
    pub jobs: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            country: Country::Es,
            test_fraction: 0.2,
            split_seed: 42,
            n_rounds: 100,
            learning_rate: 0.01,
            eval: false,
            jobs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_enum() {
        assert_eq!(TrafficStatus::from_code(0), Some(TrafficStatus::Fluid));
        assert_eq!(TrafficStatus::from_code(9), Some(TrafficStatus::UnderpassNoData));
        assert!(TrafficStatus::from_code(10).is_none());
        assert!(TrafficStatus::from_code(-1).is_none());
    }

    #[test]
    fn unknown_and_missing_codes_get_neutral_labels() {
        assert_eq!(status_label(42), "unknown");
        assert_eq!(status_label(MISSING_MODEL_STATUS), "no model");
        assert_eq!(status_label(2), "congested");
    }

    #[test]
    fn model_input_excludes_week() {
        let f = CalendarFeatures {
            year: 2024,
            month: 3,
            day: 15,
            weekday: 5,
            hour: 8,
            is_business_day: true,
            week: 11,
        };
        assert_eq!(f.model_input(), [2024.0, 3.0, 15.0, 5.0, 1.0, 8.0]);
    }
}
