//! Label filtering and class weighting.

use std::collections::BTreeMap;

/// Indices of rows whose label occurs at least twice.
///
/// A label seen only once cannot be placed on both sides of a stratified split.
pub fn rows_with_repeated_labels(labels: &[i64]) -> Vec<usize> {
    let counts = label_counts(labels);
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| counts.get(label).copied().unwrap_or(0) >= 2)
        .map(|(idx, _)| idx)
        .collect()
}

pub fn label_counts(labels: &[i64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_insert(0) += 1;
    }
    counts
}

/// Inverse-frequency class weights: `total / (n_classes * count)`.
///
/// Classes with a zero count get weight 0.
pub fn class_weights(labels: &[i64]) -> BTreeMap<i64, f64> {
    let counts = label_counts(labels);
    let total = labels.len() as f64;
    let n_classes = counts.len() as f64;
    counts
        .into_iter()
        .map(|(label, count)| {
            let weight = if count > 0 {
                total / (n_classes * count as f64)
            } else {
                0.0
            };
            (label, weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_occurrence_label_is_excluded() {
        let labels = [0, 0, 3, 1, 1, 0];
        let kept = rows_with_repeated_labels(&labels);
        assert_eq!(kept, vec![0, 1, 3, 4, 5]);
        assert!(kept.iter().all(|&i| labels[i] != 3));
    }

    #[test]
    fn weights_are_inverse_frequency() {
        let labels = [0, 0, 0, 1];
        let w = class_weights(&labels);
        assert!((w[&0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[&1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn balanced_classes_get_unit_weight() {
        let w = class_weights(&[1, 2, 1, 2]);
        assert!(w.values().all(|v| (v - 1.0).abs() < 1e-12));
    }
}
