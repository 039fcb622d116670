//! Stratified train/test split.
//!
//! The test size is `ceil(test_fraction * n)`. It is allocated across classes
//! proportionally to their counts (largest remainder), and every class keeps at
//! least one row on each side. Rows are shuffled per class with a seeded RNG so
//! the split is reproducible.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

/// Row indices of each side of the split, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn stratified_split(labels: &[i64], test_fraction: f64, seed: u64) -> Result<SplitIndices, AppError> {
    if !(test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::input(format!(
            "Invalid test fraction {test_fraction} (must be in (0, 1))."
        )));
    }

    let n = labels.len();
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        by_class.entry(*label).or_default().push(idx);
    }
    let n_classes = by_class.len();

    if let Some((label, _)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(AppError::training(format!(
            "Class {label} has fewer than 2 rows; cannot stratify."
        )));
    }

    // The epsilon keeps exact products such as 0.2 * 15 from rounding up.
    let n_test = ((test_fraction * n as f64) - 1e-9).ceil() as usize;
    let n_train = n - n_test;
    if n_test < n_classes || n_train < n_classes {
        return Err(AppError::training(format!(
            "Split of {n} rows into train={n_train}/test={n_test} cannot hold all {n_classes} classes."
        )));
    }

    let allocation = allocate_test_counts(&by_class, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (rows, take) in by_class.values().zip(allocation) {
        let mut rows = rows.clone();
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..take]);
        train.extend_from_slice(&rows[take..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

/// Per-class test counts summing to `n_test`, each in `1..count`.
fn allocate_test_counts(by_class: &BTreeMap<i64, Vec<usize>>, n: usize, n_test: usize) -> Vec<usize> {
    let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
    let exact: Vec<f64> = counts
        .iter()
        .map(|c| n_test as f64 * *c as f64 / n as f64)
        .collect();

    let mut alloc: Vec<usize> = exact
        .iter()
        .zip(&counts)
        .map(|(e, c)| (e.floor() as usize).clamp(1, c - 1))
        .collect();

    // Hand out (or take back) rows by largest remainder until the total matches.
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut total: usize = alloc.iter().sum();
    while total < n_test {
        let Some(pos) = order.iter().position(|&i| alloc[i] < counts[i] - 1) else { break };
        let idx = order.remove(pos);
        alloc[idx] += 1;
        total += 1;
        order.push(idx);
    }
    while total > n_test {
        let Some(&idx) = order.iter().rev().find(|&&i| alloc[i] > 1) else { break };
        alloc[idx] -= 1;
        total -= 1;
    }

    alloc
}
