//! Status prediction from persisted per-road models.
//!
//! A missing model file is not an error: the road's prediction is
//! `MISSING_MODEL_STATUS` (`-1`) so callers can render a neutral value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::calendar::{HolidayCalendar, calendar_features};
use crate::domain::{Country, MISSING_MODEL_STATUS, RoadModel};
use crate::error::AppError;
use crate::io::model_store::{find_model, list_model_ids};

/// Predicts statuses for many roads/timestamps, caching loaded models and
/// holiday sets.
///
/// Features are built with the holiday calendar each model was trained with.
/// `country` is what the caller expects; models saved with another calendar are
/// still served, with a warning.
#[derive(Debug)]
pub struct Predictor {
    models_dir: PathBuf,
    country: Country,
    calendars: HashMap<Country, HolidayCalendar>,
    models: HashMap<String, Option<RoadModel>>,
}

impl Predictor {
    pub fn new(models_dir: impl Into<PathBuf>, country: Country) -> Self {
        Self {
            models_dir: models_dir.into(),
            country,
            calendars: HashMap::new(),
            models: HashMap::new(),
        }
    }

    /// Predicted status code for `road_id` at `timestamp`, or `-1` without a model.
    pub fn predict(&mut self, road_id: &str, timestamp: NaiveDateTime) -> Result<i64, AppError> {
        if !self.models.contains_key(road_id) {
            let model = find_model(&self.models_dir, road_id)?;
            match &model {
                None => {
                    tracing::warn!(road = road_id, dir = %self.models_dir.display(), "no model for road");
                }
                Some(model) if model.country != self.country => {
                    tracing::warn!(
                        road = road_id,
                        trained = ?model.country,
                        requested = ?self.country,
                        "model was trained with another holiday calendar; using the model's"
                    );
                }
                Some(_) => {}
            }
            self.models.insert(road_id.to_string(), model);
        }

        let Some(Some(model)) = self.models.get(road_id) else {
            return Ok(MISSING_MODEL_STATUS);
        };
        let calendar = self
            .calendars
            .entry(model.country)
            .or_insert_with(|| HolidayCalendar::new(model.country));
        let features = calendar_features(timestamp, calendar);
        Ok(model.predict(&features))
    }

    /// Predictions for every road that has a model file, sorted by road id.
    pub fn predict_all(&mut self, timestamp: NaiveDateTime) -> Result<Vec<(String, i64)>, AppError> {
        let ids = list_model_ids(&self.models_dir)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let status = self.predict(&id, timestamp)?;
            out.push((id, status));
        }
        Ok(out)
    }
}

/// One-off prediction for a single road.
pub fn predict_status(
    models_dir: &Path,
    road_id: &str,
    timestamp: NaiveDateTime,
    country: Country,
) -> Result<i64, AppError> {
    Predictor::new(models_dir, country).predict(road_id, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nalgebra::DMatrix;

    use crate::domain::FEATURE_NAMES;
    use crate::io::model_store::{model_path, save_model};
    use crate::models::{BoostParams, BoostedClassifier};

    /// Model whose label is the `is_business_day` input, trained on Monday 2025-01-06.
    fn business_day_model(country: Country) -> RoadModel {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let business = (i % 2) as f64;
            data.extend_from_slice(&[2025.0, 1.0, 6.0, 1.0, business, 8.0]);
            labels.push(i % 2);
        }
        let x = DMatrix::from_row_slice(40, 6, &data);
        let params = BoostParams {
            n_rounds: 30,
            learning_rate: 0.5,
            min_leaf_rows: 1,
            ..BoostParams::default()
        };
        let classifier = BoostedClassifier::fit(&x, &labels, &[1.0; 40], &params).unwrap();

        RoadModel {
            tool: "rtp".to_string(),
            road_id: "2018".to_string(),
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            country,
            n_train: 40,
            n_test: 0,
            rare_rows_dropped: 0,
            class_weights: vec![(0, 1.0), (1, 1.0)],
            classifier,
        }
    }

    #[test]
    fn missing_model_returns_sentinel() {
        let dir = std::env::temp_dir().join(format!("rtp-predict-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();

        let status = predict_status(&dir, "999999", ts, Country::Es).unwrap();
        assert_eq!(status, MISSING_MODEL_STATUS);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn features_use_the_calendar_the_model_was_trained_with() {
        let dir = std::env::temp_dir().join(format!("rtp-predict-country-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let model = business_day_model(Country::Es);
        save_model(&model_path(&dir, "2018").unwrap(), &model).unwrap();

        // Epiphany: a holiday in Spain, a plain Monday without holidays.
        let epiphany = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2025, 1, 13).unwrap().and_hms_opt(8, 0, 0).unwrap();

        let mut predictor = Predictor::new(&dir, Country::NoHolidays);
        assert_eq!(predictor.predict("2018", epiphany).unwrap(), 0);
        assert_eq!(predictor.predict("2018", next_monday).unwrap(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
