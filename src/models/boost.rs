//! Multiclass gradient boosting with a softmax objective.
//!
//! Every round fits one regression tree per class on the softmax gradients:
//!
//! ```text
//! p_k  = softmax(F)_k
//! g_ik = w_i (p_ik - y_ik)
//! h_ik = w_i · K/(K-1) · p_ik (1 - p_ik)
//! F_k += η · tree_k(x)
//! ```
//!
//! Raw scores start at the weighted log class prior. A single-class target
//! produces a constant classifier with no trees.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::tree::{RegressionTree, TreeParams};

/// Floor for class priors before taking the log.
const MIN_PRIOR: f64 = 1e-15;

/// Boosting hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    /// `None` means unconstrained depth.
    pub max_depth: Option<usize>,
    pub min_leaf_rows: usize,
    pub min_leaf_hessian: f64,
    pub l2: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.01,
            max_leaves: 31,
            max_depth: None,
            min_leaf_rows: 20,
            min_leaf_hessian: 1e-3,
            l2: 0.0,
        }
    }
}

impl BoostParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_leaves: self.max_leaves,
            max_depth: self.max_depth,
            min_leaf_rows: self.min_leaf_rows,
            min_leaf_hessian: self.min_leaf_hessian,
            l2: self.l2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    /// Sorted distinct labels; position = class index.
    classes: Vec<i64>,
    params: BoostParams,
    init_scores: Vec<f64>,
    /// `rounds[r][k]` is the (already shrunk) tree of round `r` for class `k`.
    rounds: Vec<Vec<RegressionTree>>,
}

impl BoostedClassifier {
    /// Fit on the rows of `x` with labels `y` and per-row `sample_weight`.
    pub fn fit(x: &DMatrix<f64>, y: &[i64], sample_weight: &[f64], params: &BoostParams) -> Result<Self, AppError> {
        let n = x.nrows();
        if n == 0 {
            return Err(AppError::training("Cannot fit a classifier on zero rows."));
        }
        if y.len() != n || sample_weight.len() != n {
            return Err(AppError::training(format!(
                "Shape mismatch: x has {n} rows, y has {}, weights have {}.",
                y.len(),
                sample_weight.len()
            )));
        }
        if sample_weight.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::training("Sample weights must be finite and >= 0."));
        }
        let total_weight: f64 = sample_weight.iter().sum();
        if total_weight <= 0.0 {
            return Err(AppError::training("Sample weights sum to zero."));
        }
        if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
            return Err(AppError::training("Learning rate must be finite and > 0."));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let k = classes.len();

        if k == 1 {
            return Ok(Self {
                classes,
                params: *params,
                init_scores: vec![0.0],
                rounds: Vec::new(),
            });
        }

        let labels: Vec<usize> = y
            .iter()
            .map(|v| classes.binary_search(v).unwrap_or_default())
            .collect();

        let mut prior = vec![0.0; k];
        for (label, w) in labels.iter().zip(sample_weight) {
            prior[*label] += w;
        }
        let init_scores: Vec<f64> = prior
            .iter()
            .map(|p| (p / total_weight).max(MIN_PRIOR).ln())
            .collect();

        let rows_x: Vec<Vec<f64>> = (0..n).map(|i| x.row(i).iter().copied().collect()).collect();
        let all_rows: Vec<usize> = (0..n).collect();
        let tree_params = params.tree_params();
        let factor = k as f64 / (k as f64 - 1.0);

        let mut scores = DMatrix::from_fn(n, k, |_, c| init_scores[c]);
        let mut probs = DMatrix::<f64>::zeros(n, k);
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut rounds = Vec::with_capacity(params.n_rounds);

        for _ in 0..params.n_rounds {
            for i in 0..n {
                let row: Vec<f64> = scores.row(i).iter().copied().collect();
                for (c, p) in softmax(&row).into_iter().enumerate() {
                    probs[(i, c)] = p;
                }
            }

            let mut trees = Vec::with_capacity(k);
            for c in 0..k {
                for i in 0..n {
                    let p = probs[(i, c)];
                    let target = if labels[i] == c { 1.0 } else { 0.0 };
                    let w = sample_weight[i];
                    grad[i] = w * (p - target);
                    hess[i] = w * factor * p * (1.0 - p);
                }

                let mut tree = RegressionTree::fit(x, &grad, &hess, &all_rows, &tree_params);
                tree.scale(params.learning_rate);
                for i in 0..n {
                    scores[(i, c)] += tree.predict(&rows_x[i]);
                }
                trees.push(tree);
            }
            rounds.push(trees);
        }

        Ok(Self {
            classes,
            params: *params,
            init_scores,
            rounds,
        })
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Raw (pre-softmax) scores per class.
    pub fn raw_scores(&self, x: &[f64]) -> Vec<f64> {
        let mut scores = self.init_scores.clone();
        for trees in &self.rounds {
            for (score, tree) in scores.iter_mut().zip(trees) {
                *score += tree.predict(x);
            }
        }
        scores
    }

    /// Class probabilities, aligned with `classes()`.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        if self.classes.len() == 1 {
            return vec![1.0];
        }
        softmax(&self.raw_scores(x))
    }

    /// Most probable label (first class wins ties).
    pub fn predict(&self, x: &[f64]) -> i64 {
        let proba = self.predict_proba(x);
        let mut best = 0;
        for (idx, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = idx;
            }
        }
        self.classes[best]
    }

    pub fn predict_rows(&self, x: &DMatrix<f64>) -> Vec<i64> {
        (0..x.nrows())
            .map(|i| {
                let row: Vec<f64> = x.row(i).iter().copied().collect();
                self.predict(&row)
            })
            .collect()
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> BoostParams {
        BoostParams {
            n_rounds: 50,
            learning_rate: 0.3,
            min_leaf_rows: 2,
            ..BoostParams::default()
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[1000.0, 1000.0, 999.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((p[0] - p[1]).abs() < 1e-12);
    }

    #[test]
    fn learns_a_separable_problem() {
        // Hour < 12 -> status 0, afternoon -> 1, night -> 2.
        let hours: Vec<f64> = (0..24).map(|h| h as f64).collect();
        let y: Vec<i64> = (0..24).map(|h| if h < 12 { 0 } else if h < 20 { 1 } else { 2 }).collect();
        let x = DMatrix::from_column_slice(24, 1, &hours);
        let w = vec![1.0; 24];

        let model = BoostedClassifier::fit(&x, &y, &w, &small_params()).unwrap();
        assert_eq!(model.classes(), &[0, 1, 2]);
        assert_eq!(model.n_rounds(), 50);
        assert_eq!(model.predict(&[3.0]), 0);
        assert_eq!(model.predict(&[15.0]), 1);
        assert_eq!(model.predict(&[22.0]), 2);
    }

    #[test]
    fn untrained_rounds_predict_the_weighted_majority() {
        let x = DMatrix::from_column_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = [5, 5, 5, 7];
        // Class 7 is weighted up enough to dominate the prior.
        let w = [1.0, 1.0, 1.0, 6.0];
        let params = BoostParams {
            n_rounds: 0,
            ..BoostParams::default()
        };
        let model = BoostedClassifier::fit(&x, &y, &w, &params).unwrap();
        assert_eq!(model.predict(&[0.0]), 7);
    }

    #[test]
    fn single_class_is_constant() {
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);
        let model = BoostedClassifier::fit(&x, &[4, 4, 4], &[1.0; 3], &BoostParams::default()).unwrap();
        assert_eq!(model.predict(&[10.0]), 4);
        assert_eq!(model.predict_proba(&[10.0]), vec![1.0]);
        assert_eq!(model.n_rounds(), 0);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let x = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
        let err = BoostedClassifier::fit(&x, &[0], &[1.0, 1.0], &BoostParams::default()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
