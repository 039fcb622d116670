//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums and structs (`Country`, `IngestConfig`, `TrainConfig`)
//! - the snapshot, wide and feature tables
//! - the traffic status vocabulary and persisted models (`TrafficStatus`, `RoadModel`)

pub mod types;

pub use types::*;
