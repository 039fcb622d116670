//! `traffic-status` library crate.
//!
//! The binary (`rtp`) is a thin wrapper around this library so that:
//!
//! - every pipeline stage is a plain function, testable without spawning processes
//! - the prediction path can be reused by other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod calendar;
pub mod cli;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod models;
pub mod predict;
pub mod report;
