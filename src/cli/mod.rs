//! Command-line parsing for the per-road traffic status pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline code. Defaults reproduce the conventional layout (`data/`,
//! `data_concat.csv`, `models/`); each path can also come from the
//! environment or a `.env` file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Country;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rtp", version, about = "Per-road traffic status trainer and predictor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pivot a directory of snapshot CSVs into one wide CSV.
    Ingest(IngestArgs),
    /// Train one classifier per road from the wide CSV.
    Train(TrainArgs),
    /// Ingest then train in one go.
    Run(RunArgs),
    /// Predict road statuses for a timestamp from saved models.
    Predict(PredictArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IngestArgs {
    /// Directory of `estat_traf<DD-MM-YYYY_HH-MM-SS>.csv` snapshots.
    #[arg(long, env = "TRAFFIC_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Output wide CSV.
    #[arg(short = 'o', long = "output", env = "TRAFFIC_WIDE_CSV", default_value = "data_concat.csv")]
    pub output: PathBuf,
}

/// Options shared by `train` and `run`.
#[derive(Debug, Args, Clone)]
pub struct TrainOpts {
    /// Directory for `model_<road_id>.json` files.
    #[arg(long, env = "TRAFFIC_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Country whose public holidays are not business days.
    #[arg(long, value_enum, env = "TRAFFIC_COUNTRY", default_value_t = Country::Es)]
    pub country: Country,

    /// Fraction of rows held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Seed for the stratified split.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Boosting rounds.
    #[arg(long, default_value_t = 100)]
    pub rounds: usize,

    /// Boosting learning rate.
    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,

    /// Print accuracy and a classification report per road.
    #[arg(long)]
    pub eval: bool,

    /// Worker threads (0 = one per core).
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: usize,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Wide CSV produced by `rtp ingest`.
    #[arg(short = 'i', long = "input", env = "TRAFFIC_WIDE_CSV", default_value = "data_concat.csv")]
    pub input: PathBuf,

    #[command(flatten)]
    pub opts: TrainOpts,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,

    #[command(flatten)]
    pub opts: TrainOpts,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Timestamp to predict (`YYYY-MM-DDTHH:MM[:SS]`).
    #[arg(long)]
    pub at: String,

    /// Road id; all roads with a model when omitted.
    #[arg(long)]
    pub road: Option<String>,

    /// Directory of saved models.
    #[arg(long, env = "TRAFFIC_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Country whose public holidays are not business days.
    #[arg(long, value_enum, env = "TRAFFIC_COUNTRY", default_value_t = Country::Es)]
    pub country: Country,
}
