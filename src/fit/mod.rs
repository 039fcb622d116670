//! Per-road training.
//!
//! Responsibilities:
//!
//! - filter rare labels and compute class weights (`weights`)
//! - stratified train/test split (`split`)
//! - fit, evaluate and persist one model per road, in parallel (`trainer`)

pub mod split;
pub mod trainer;
pub mod weights;

pub use split::*;
pub use trainer::*;
pub use weights::*;
