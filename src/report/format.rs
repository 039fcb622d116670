//! Formatted terminal output.
//!
//! We keep formatting code in one place so the pipeline stays free of
//! presentation details and output changes are localized.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::{TrainConfig, status_label};
use crate::fit::trainer::TrainSummary;
use crate::io::ingest::IngestedData;
use crate::report::Evaluation;

/// Summary of an ingest run.
pub fn format_ingest_summary(ingest: &IngestedData, output: &Path) -> String {
    let mut out = String::new();
    out.push_str("=== rtp - snapshot ingest ===\n");
    out.push_str(&format!("Snapshots: {}\n", ingest.files_read));
    out.push_str(&format!(
        "Rows: read={} | dropped (no road name)={}\n",
        ingest.rows_read, ingest.rows_dropped
    ));
    out.push_str(&format!("Roads: {}\n", ingest.table.road_ids.len()));
    if let (Some(first), Some(last)) = (ingest.table.rows.first(), ingest.table.rows.last()) {
        out.push_str(&format!("Range: {} .. {}\n", first.timestamp, last.timestamp));
    }
    out.push_str(&format!("Wrote: {}\n", output.display()));
    out
}

/// Summary of a training run.
pub fn format_train_summary(summary: &TrainSummary, config: &TrainConfig) -> String {
    let mut out = String::new();
    out.push_str("=== rtp - per-road training ===\n");
    out.push_str(&format!("Country calendar: {:?}\n", config.country));
    out.push_str(&format!(
        "Rows: used={} | dropped (missing statuses)={}\n",
        summary.rows_used, summary.rows_dropped
    ));
    out.push_str(&format!(
        "Booster: rounds={} | learning_rate={}\n",
        config.n_rounds, config.learning_rate
    ));
    out.push_str(&format!(
        "Models: trained={} | skipped={} -> {}\n",
        summary.trained.len(),
        summary.skipped.len(),
        config.models_dir.display()
    ));

    if !summary.skipped.is_empty() {
        out.push_str("\nSkipped roads:\n");
        for (road_id, reason) in &summary.skipped {
            out.push_str(&format!("  {road_id:<10} {reason}\n"));
        }
    }

    let evaluated: Vec<_> = summary
        .trained
        .iter()
        .filter_map(|t| t.evaluation.as_ref().map(|e| (t, e)))
        .collect();
    if !evaluated.is_empty() {
        let mean = evaluated.iter().map(|(_, e)| e.accuracy).sum::<f64>() / evaluated.len() as f64;
        out.push_str(&format!("\nMean held-out accuracy: {mean:.4}\n"));
        for (trained, evaluation) in evaluated {
            out.push('\n');
            out.push_str(&format_evaluation(&trained.road_id, evaluation));
        }
    }

    out
}

/// Classification report for one road.
pub fn format_evaluation(road_id: &str, evaluation: &Evaluation) -> String {
    let mut out = String::new();
    out.push_str(&format!("--- road {road_id} ---\n"));
    out.push_str(&format!("Accuracy: {:.4}\n", evaluation.accuracy));
    out.push_str(&format!(
        "{:>22} {:>9} {:>9} {:>9} {:>9}\n",
        "", "precision", "recall", "f1-score", "support"
    ));
    for c in &evaluation.classes {
        let label = format!("{} ({})", c.label, status_label(c.label));
        out.push_str(&format!(
            "{:>22} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            label, c.precision, c.recall, c.f1, c.support
        ));
    }
    out.push_str(&format!(
        "{:>22} {:>9} {:>9} {:>9.2} {:>9}\n",
        "macro avg f1", "", "", evaluation.macro_f1, evaluation.support
    ));
    out.push_str(&format!(
        "{:>22} {:>9} {:>9} {:>9.2} {:>9}\n",
        "weighted avg f1", "", "", evaluation.weighted_f1, evaluation.support
    ));
    out
}

/// Predicted status per road for one timestamp.
pub fn format_predictions(timestamp: NaiveDateTime, predictions: &[(String, i64)]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Predicted status at {timestamp}:\n"));
    out.push_str(&format!("{:<10} {:>6}  {}\n", "road", "code", "status"));
    for (road_id, code) in predictions {
        out.push_str(&format!("{:<10} {:>6}  {}\n", road_id, code, status_label(*code)));
    }
    out
}
