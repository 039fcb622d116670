//! Input/output helpers.
//!
//! - snapshot ingest + pivot (`ingest`)
//! - wide CSV read/write (`wide`)
//! - per-road model files (`model_store`)

pub mod ingest;
pub mod model_store;
pub mod wide;

pub use ingest::*;
pub use model_store::*;
pub use wide::*;
