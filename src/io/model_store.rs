//! Read/write per-road model files.
//!
//! Each road's model lives in `<models_dir>/model_<road_id>.json`. The schema is
//! `domain::RoadModel`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::RoadModel;
use crate::error::AppError;

const MODEL_PREFIX: &str = "model_";
const MODEL_SUFFIX: &str = ".json";

/// Path of the model file for `road_id`.
///
/// Road ids come from CSV headers, so anything that could escape the models
/// directory is rejected.
pub fn model_path(models_dir: &Path, road_id: &str) -> Result<PathBuf, AppError> {
    let invalid = road_id.is_empty()
        || road_id == "."
        || road_id == ".."
        || road_id.chars().any(|c| matches!(c, '/' | '\\') || c.is_control());
    if invalid {
        return Err(AppError::input(format!("Invalid road id '{road_id}'.")));
    }
    Ok(models_dir.join(format!("{MODEL_PREFIX}{road_id}{MODEL_SUFFIX}")))
}

/// Write a model JSON file.
pub fn save_model(path: &Path, model: &RoadModel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create model file '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, model)
        .map_err(|e| AppError::input(format!("Failed to write model file '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush model file '{}': {e}", path.display())))
}

/// Read a model JSON file.
pub fn load_model(path: &Path) -> Result<RoadModel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open model file '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::input(format!("Invalid model file '{}': {e}", path.display())))
}

/// Load the model for `road_id`, or `None` when no file exists.
pub fn find_model(models_dir: &Path, road_id: &str) -> Result<Option<RoadModel>, AppError> {
    let path = model_path(models_dir, road_id)?;
    match File::open(&path) {
        Ok(_) => load_model(&path).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::input(format!(
            "Failed to open model file '{}': {e}",
            path.display()
        ))),
    }
}

/// Road ids that have a model file, sorted.
pub fn list_model_ids(models_dir: &Path) -> Result<Vec<String>, AppError> {
    let entries = fs::read_dir(models_dir).map_err(|e| {
        AppError::input(format!("Failed to read models directory '{}': {e}", models_dir.display()))
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::input(format!("Failed to list models directory '{}': {e}", models_dir.display()))
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(id) = name
            .strip_prefix(MODEL_PREFIX)
            .and_then(|s| s.strip_suffix(MODEL_SUFFIX))
        {
            ids.push(id.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}
