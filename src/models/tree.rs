//! Second-order regression trees used as boosting stages.
//!
//! Trees are grown leaf-wise: at every step the open leaf with the largest
//! split gain is split, until `max_leaves` is reached or no split improves the
//! objective. Split gain and leaf values use the usual Newton terms:
//!
//! ```text
//! score(G, H) = G² / (H + λ)
//! gain        = score(G_L, H_L) + score(G_R, H_R) - score(G, H)
//! leaf        = -G / (H + λ)
//! ```

use std::cmp::Ordering;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Minimum gain for a split to be accepted.
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_leaves: usize,
    /// `None` means unconstrained depth.
    pub max_depth: Option<usize>,
    pub min_leaf_rows: usize,
    pub min_leaf_hessian: f64,
    pub l2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_rows: Vec<usize>,
    right_rows: Vec<usize>,
    left_value: f64,
    right_value: f64,
}

#[derive(Debug)]
struct OpenLeaf {
    node: usize,
    depth: usize,
    split: Option<SplitCandidate>,
}

impl RegressionTree {
    /// A tree with a single constant leaf.
    pub fn constant(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    /// Fit a tree on `rows` of `x` given per-row gradients and hessians.
    ///
    /// `grad` and `hess` are indexed by row number, like `x`.
    pub fn fit(x: &DMatrix<f64>, grad: &[f64], hess: &[f64], rows: &[usize], params: &TreeParams) -> Self {
        let (g, h) = sums(grad, hess, rows);
        let mut nodes = vec![Node::Leaf {
            value: leaf_value(g, h, params.l2),
        }];

        let mut open = vec![OpenLeaf {
            node: 0,
            depth: 0,
            split: find_split(x, grad, hess, rows, params, 0),
        }];
        let mut n_leaves = 1usize;

        while n_leaves < params.max_leaves.max(1) {
            let best = open
                .iter()
                .enumerate()
                .filter_map(|(idx, leaf)| leaf.split.as_ref().map(|s| (idx, s.gain)))
                .filter(|(_, gain)| *gain > MIN_SPLIT_GAIN)
                .fold(None::<(usize, f64)>, |acc, (idx, gain)| match acc {
                    Some((_, best_gain)) if best_gain >= gain => acc,
                    _ => Some((idx, gain)),
                });
            let Some((idx, _)) = best else { break };

            let leaf = open.swap_remove(idx);
            let Some(split) = leaf.split else { break };

            let left = nodes.len();
            nodes.push(Node::Leaf {
                value: split.left_value,
            });
            let right = nodes.len();
            nodes.push(Node::Leaf {
                value: split.right_value,
            });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            n_leaves += 1;

            let depth = leaf.depth + 1;
            for (node, child_rows) in [(left, split.left_rows), (right, split.right_rows)] {
                open.push(OpenLeaf {
                    node,
                    depth,
                    split: find_split(x, grad, hess, &child_rows, params, depth),
                });
            }
        }

        Self { nodes }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Multiply every leaf value by `factor` (shrinkage).
    pub fn scale(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn sums(grad: &[f64], hess: &[f64], rows: &[usize]) -> (f64, f64) {
    rows.iter()
        .fold((0.0, 0.0), |(g, h), &r| (g + grad[r], h + hess[r]))
}

fn leaf_value(g: f64, h: f64, l2: f64) -> f64 {
    let denom = h + l2;
    if denom > 0.0 && denom.is_finite() { -g / denom } else { 0.0 }
}

fn score(g: f64, h: f64, l2: f64) -> f64 {
    let denom = h + l2;
    if denom > 0.0 { g * g / denom } else { 0.0 }
}

fn find_split(
    x: &DMatrix<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    params: &TreeParams,
    depth: usize,
) -> Option<SplitCandidate> {
    if params.max_depth.is_some_and(|max| depth >= max) {
        return None;
    }
    let min_rows = params.min_leaf_rows.max(1);
    let n = rows.len();
    if n < 2 * min_rows {
        return None;
    }

    let (g_total, h_total) = sums(grad, hess, rows);
    let parent = score(g_total, h_total, params.l2);

    // (feature, threshold, gain)
    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted = rows.to_vec();

    for feature in 0..x.ncols() {
        sorted.sort_by(|&a, &b| {
            x[(a, feature)]
                .partial_cmp(&x[(b, feature)])
                .unwrap_or(Ordering::Equal)
        });

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for i in 0..n - 1 {
            let r = sorted[i];
            g_left += grad[r];
            h_left += hess[r];

            let here = x[(r, feature)];
            let next = x[(sorted[i + 1], feature)];
            if here == next {
                continue;
            }

            let n_left = i + 1;
            if n_left < min_rows || n - n_left < min_rows {
                continue;
            }
            let h_right = h_total - h_left;
            if h_left < params.min_leaf_hessian || h_right < params.min_leaf_hessian {
                continue;
            }

            let gain = score(g_left, h_left, params.l2) + score(g_total - g_left, h_right, params.l2) - parent;
            if best.is_none_or(|(_, _, best_gain)| gain > best_gain) {
                best = Some((feature, 0.5 * (here + next), gain));
            }
        }
    }

    let (feature, threshold, gain) = best?;
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&r| x[(r, feature)] <= threshold);

    let (g_left, h_left) = sums(grad, hess, &left_rows);
    let (g_right, h_right) = sums(grad, hess, &right_rows);

    Some(SplitCandidate {
        feature,
        threshold,
        gain,
        left_value: leaf_value(g_left, h_left, params.l2),
        right_value: leaf_value(g_right, h_right, params.l2),
        left_rows,
        right_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_leaf_rows: usize) -> TreeParams {
        TreeParams {
            max_leaves: 31,
            max_depth: None,
            min_leaf_rows,
            min_leaf_hessian: 1e-3,
            l2: 0.0,
        }
    }

    #[test]
    fn splits_on_informative_feature() {
        // Feature 1 separates the gradients, feature 0 is constant.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 5.0, 1.0, 5.0]);
        let grad = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let rows: Vec<usize> = (0..4).collect();

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &params(1));
        assert_eq!(tree.n_leaves(), 2);
        assert!((tree.predict(&[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((tree.predict(&[1.0, 5.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn min_leaf_rows_blocks_small_splits() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let grad = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let rows: Vec<usize> = (0..4).collect();

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &params(3));
        assert_eq!(tree.n_leaves(), 1);
        assert!(tree.predict(&[0.0]).abs() < 1e-12);
    }

    #[test]
    fn depth_limit_is_respected() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let grad = [-2.0, -1.0, 1.0, 2.0];
        let hess = [1.0; 4];
        let rows: Vec<usize> = (0..4).collect();
        let mut p = params(1);
        p.max_depth = Some(1);

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &p);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn scale_shrinks_leaves() {
        let mut tree = RegressionTree::constant(2.0);
        tree.scale(0.5);
        assert_eq!(tree.predict(&[]), 1.0);
    }
}
