//! Per-road training loop.
//!
//! For every road column of the feature table:
//! - drop rows whose status occurs only once for that road
//! - split 80/20 stratified by status
//! - weight classes by inverse frequency and fit the booster
//! - optionally evaluate on the held-out split
//! - persist the model and check that the file reproduces its predictions
//!
//! Roads are independent, so the loop runs in parallel on a rayon pool.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{FEATURE_NAMES, FeatureTable, RoadModel, TrainConfig};
use crate::error::AppError;
use crate::fit::split::stratified_split;
use crate::fit::weights::{class_weights, rows_with_repeated_labels};
use crate::io::model_store::{load_model, model_path, save_model};
use crate::models::{BoostParams, BoostedClassifier};
use crate::report::{Evaluation, evaluate};

const TOOL_NAME: &str = "rtp";

/// A fitted road model before it is written to disk.
#[derive(Debug, Clone)]
pub struct RoadFit {
    pub model: RoadModel,
    pub evaluation: Option<Evaluation>,
    /// First training row, used to check the saved file.
    pub check_row: [f64; 6],
}

#[derive(Debug, Clone)]
pub enum RoadOutcome {
    Trained(Box<RoadFit>),
    /// The road cannot be trained (e.g. too few rows to stratify).
    Skipped { reason: String },
}

/// A road whose model was written.
#[derive(Debug, Clone)]
pub struct TrainedRoad {
    pub road_id: String,
    pub path: PathBuf,
    pub n_train: usize,
    pub n_test: usize,
    pub n_classes: usize,
    pub rare_rows_dropped: usize,
    pub evaluation: Option<Evaluation>,
}

/// Result of a full training run.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub rows_used: usize,
    pub rows_dropped: usize,
    pub trained: Vec<TrainedRoad>,
    /// `(road_id, reason)`.
    pub skipped: Vec<(String, String)>,
}

enum Finished {
    Trained(TrainedRoad),
    Skipped(String, String),
}

pub fn boost_params(config: &TrainConfig) -> BoostParams {
    BoostParams {
        n_rounds: config.n_rounds,
        learning_rate: config.learning_rate,
        ..BoostParams::default()
    }
}

/// Train the classifier for one road column. Nothing is written to disk.
pub fn train_road(table: &FeatureTable, road_idx: usize, config: &TrainConfig) -> Result<RoadOutcome, AppError> {
    let road_id = table
        .road_ids
        .get(road_idx)
        .ok_or_else(|| AppError::training(format!("Road column {road_idx} out of range.")))?;

    let all_labels = table.target(road_idx);
    let kept = rows_with_repeated_labels(&all_labels);
    let rare_rows_dropped = all_labels.len() - kept.len();
    if rare_rows_dropped > 0 {
        tracing::debug!(road = %road_id, rows = rare_rows_dropped, "dropped single-occurrence statuses");
    }
    if kept.is_empty() {
        return Ok(RoadOutcome::Skipped {
            reason: "no status occurs at least twice".to_string(),
        });
    }

    let labels: Vec<i64> = kept.iter().map(|&i| all_labels[i]).collect();
    let split = match stratified_split(&labels, config.test_fraction, config.split_seed) {
        Ok(split) => split,
        Err(e) if e.exit_code() == 4 => {
            return Ok(RoadOutcome::Skipped {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    };

    let train_rows: Vec<usize> = split.train.iter().map(|&i| kept[i]).collect();
    let test_rows: Vec<usize> = split.test.iter().map(|&i| kept[i]).collect();

    let x_train = feature_matrix(table, &train_rows);
    let y_train: Vec<i64> = train_rows.iter().map(|&r| all_labels[r]).collect();

    let weights = class_weights(&y_train);
    let sample_weight: Vec<f64> = y_train.iter().map(|y| weights[y]).collect();

    let classifier = BoostedClassifier::fit(&x_train, &y_train, &sample_weight, &boost_params(config))
        .map_err(|e| AppError::training(format!("Road {road_id}: {e}")))?;

    let evaluation = if config.eval {
        let x_test = feature_matrix(table, &test_rows);
        let y_test: Vec<i64> = test_rows.iter().map(|&r| all_labels[r]).collect();
        Some(evaluate(&y_test, &classifier.predict_rows(&x_test)))
    } else {
        None
    };

    let check_row = table.calendar[train_rows[0]].model_input();

    let model = RoadModel {
        tool: TOOL_NAME.to_string(),
        road_id: road_id.clone(),
        features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        country: config.country,
        n_train: train_rows.len(),
        n_test: test_rows.len(),
        rare_rows_dropped,
        class_weights: weights.into_iter().collect(),
        classifier,
    };

    Ok(RoadOutcome::Trained(Box::new(RoadFit {
        model,
        evaluation,
        check_row,
    })))
}

/// Write a fitted model and verify the file reproduces its prediction.
pub fn persist_road(fit: &RoadFit, config: &TrainConfig) -> Result<PathBuf, AppError> {
    let path = model_path(&config.models_dir, &fit.model.road_id)?;
    save_model(&path, &fit.model)?;

    let reloaded = load_model(&path)?;
    let expected = fit.model.classifier.predict(&fit.check_row);
    let actual = reloaded.classifier.predict(&fit.check_row);
    if expected != actual {
        return Err(AppError::training(format!(
            "Model file '{}' predicts {actual}, in-memory model predicts {expected}.",
            path.display()
        )));
    }

    Ok(path)
}

/// Train and persist a model for every road in the table.
pub fn train_all(table: &FeatureTable, config: &TrainConfig) -> Result<TrainSummary, AppError> {
    fs::create_dir_all(&config.models_dir).map_err(|e| {
        AppError::input(format!(
            "Failed to create models directory '{}': {e}",
            config.models_dir.display()
        ))
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| AppError::training(format!("Failed to start worker pool: {e}")))?;

    let total = table.road_ids.len();
    let done = AtomicUsize::new(0);

    let results: Vec<Result<Finished, AppError>> = pool.install(|| {
        (0..total)
            .into_par_iter()
            .map(|idx| {
                let finished = train_and_persist(table, idx, config);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!("{n}/{total} road {}", table.road_ids[idx]);
                finished
            })
            .collect()
    });

    let mut trained = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result? {
            Finished::Trained(road) => trained.push(road),
            Finished::Skipped(road_id, reason) => skipped.push((road_id, reason)),
        }
    }

    if total > 0 && trained.is_empty() {
        return Err(AppError::training(format!(
            "None of the {total} roads could be trained."
        )));
    }

    Ok(TrainSummary {
        rows_used: table.n_rows(),
        rows_dropped: table.rows_dropped,
        trained,
        skipped,
    })
}

fn train_and_persist(table: &FeatureTable, idx: usize, config: &TrainConfig) -> Result<Finished, AppError> {
    let road_id = table.road_ids[idx].clone();
    match train_road(table, idx, config)? {
        RoadOutcome::Trained(fit) => {
            let path = persist_road(&fit, config)?;
            Ok(Finished::Trained(TrainedRoad {
                road_id,
                path,
                n_train: fit.model.n_train,
                n_test: fit.model.n_test,
                n_classes: fit.model.classifier.classes().len(),
                rare_rows_dropped: fit.model.rare_rows_dropped,
                evaluation: fit.evaluation,
            }))
        }
        RoadOutcome::Skipped { reason } => {
            tracing::warn!(road = %road_id, %reason, "road skipped");
            Ok(Finished::Skipped(road_id, reason))
        }
    }
}

fn feature_matrix(table: &FeatureTable, rows: &[usize]) -> DMatrix<f64> {
    let mut data = Vec::with_capacity(rows.len() * FEATURE_NAMES.len());
    for &r in rows {
        data.extend_from_slice(&table.calendar[r].model_input());
    }
    DMatrix::from_row_slice(rows.len(), FEATURE_NAMES.len(), &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CalendarFeatures;

    fn calendar_row(day: u32, hour: u32) -> CalendarFeatures {
        CalendarFeatures {
            year: 2024,
            month: 3,
            day,
            weekday: (day % 7) + 1,
            hour,
            is_business_day: day % 7 < 5,
            week: 10,
        }
    }

    /// 60 hourly rows; road "a" is congested in the evening, road "b" has one
    /// stray status 3.
    fn table() -> FeatureTable {
        let mut t = FeatureTable {
            road_ids: vec!["a".into(), "b".into()],
            ..FeatureTable::default()
        };
        for i in 0..60u32 {
            let hour = i % 24;
            t.calendar.push(calendar_row(1 + i / 24, hour));
            let a = if hour >= 17 { 2 } else { 0 };
            let b = if i == 30 { 3 } else { (i % 2) as i64 };
            t.statuses.push(vec![a, b]);
        }
        t
    }

    fn config() -> TrainConfig {
        TrainConfig {
            n_rounds: 10,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn trains_with_stratified_split_and_weights() {
        let outcome = train_road(&table(), 0, &config()).unwrap();
        let RoadOutcome::Trained(fit) = outcome else {
            panic!("expected a trained road");
        };
        assert_eq!(fit.model.n_train + fit.model.n_test, 60);
        assert_eq!(fit.model.n_test, 12);
        assert_eq!(fit.model.classifier.classes(), &[0, 2]);
        assert_eq!(fit.model.rare_rows_dropped, 0);
        assert_eq!(fit.model.classifier.n_rounds(), 10);
        assert!(fit.model.class_weights.iter().all(|(_, w)| *w > 0.0));
    }

    #[test]
    fn single_occurrence_status_is_excluded_from_training() {
        let RoadOutcome::Trained(fit) = train_road(&table(), 1, &config()).unwrap() else {
            panic!("expected a trained road");
        };
        assert_eq!(fit.model.rare_rows_dropped, 1);
        assert!(!fit.model.classifier.classes().contains(&3));
        assert!(fit.model.class_weights.iter().all(|(label, _)| *label != 3));
    }

    #[test]
    fn evaluation_is_optional() {
        let mut cfg = config();
        cfg.eval = true;
        let RoadOutcome::Trained(fit) = train_road(&table(), 0, &cfg).unwrap() else {
            panic!("expected a trained road");
        };
        let evaluation = fit.evaluation.unwrap();
        assert_eq!(evaluation.support, 12);
    }

    #[test]
    fn road_with_too_few_rows_is_skipped() {
        let mut t = FeatureTable {
            road_ids: vec!["tiny".into()],
            ..FeatureTable::default()
        };
        for (i, s) in [0, 0, 1, 1, 2, 2].into_iter().enumerate() {
            t.calendar.push(calendar_row(1, i as u32));
            t.statuses.push(vec![s]);
        }
        let outcome = train_road(&t, 0, &config()).unwrap();
        assert!(matches!(outcome, RoadOutcome::Skipped { .. }));
    }
}
