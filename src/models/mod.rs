//! Boosted-tree classifier used for every road.
//!
//! `tree` holds the regression-tree stage learner, `boost` the multiclass
//! softmax booster built from it. Both serialize with serde so fitted models can
//! be written to disk as JSON.

pub mod boost;
pub mod tree;

pub use boost::*;
pub use tree::*;
