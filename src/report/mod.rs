//! Reporting utilities: held-out evaluation and formatted terminal output.

pub mod format;

pub use format::*;

use std::collections::BTreeSet;

/// Per-class precision/recall/F1 on a held-out split.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Accuracy plus a classification report.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub classes: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub support: usize,
}

/// Compare predictions with the truth.
///
/// Labels are the union of both vectors; undefined ratios (zero division) are 0.
pub fn evaluate(y_true: &[i64], y_pred: &[i64]) -> Evaluation {
    let n = y_true.len().min(y_pred.len());
    let labels: BTreeSet<i64> = y_true[..n].iter().chain(&y_pred[..n]).copied().collect();

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, n);

    let classes: Vec<ClassMetrics> = labels
        .into_iter()
        .map(|label| {
            let pairs = || y_true[..n].iter().zip(&y_pred[..n]);
            let tp = pairs().filter(|(t, p)| **t == label && **p == label).count();
            let predicted = pairs().filter(|(_, p)| **p == label).count();
            let support = pairs().filter(|(t, _)| **t == label).count();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    let macro_f1 = if classes.is_empty() {
        0.0
    } else {
        classes.iter().map(|c| c.f1).sum::<f64>() / classes.len() as f64
    };
    let weighted_f1 = if n == 0 {
        0.0
    } else {
        classes.iter().map(|c| c.f1 * c.support as f64).sum::<f64>() / n as f64
    };

    Evaluation {
        accuracy,
        classes,
        macro_f1,
        weighted_f1,
        support: n,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
