//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs ingest / training / prediction
//! - prints summaries

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, IngestArgs, PredictArgs, RunArgs, TrainArgs, TrainOpts};
use crate::domain::{IngestConfig, TrainConfig};
use crate::error::AppError;
use crate::predict::Predictor;

pub mod pipeline;

/// Entry point for the `rtp` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Ingest(args) => handle_ingest(args),
        Command::Train(args) => handle_train(args),
        Command::Run(args) => handle_run(args),
        Command::Predict(args) => handle_predict(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_ingest(args: IngestArgs) -> Result<(), AppError> {
    let config = ingest_config_from_args(&args);
    let ingest = pipeline::run_ingest(&config)?;
    println!("{}", crate::report::format_ingest_summary(&ingest, &config.output));
    Ok(())
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args.opts);
    let summary = pipeline::run_train(&args.input, &config)?;
    println!("{}", crate::report::format_train_summary(&summary, &config));
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let ingest_config = ingest_config_from_args(&args.ingest);
    let train_config = train_config_from_args(&args.opts);

    let ingest = pipeline::run_ingest(&ingest_config)?;
    println!("{}", crate::report::format_ingest_summary(&ingest, &ingest_config.output));

    let summary = pipeline::train_from_wide(&ingest.table, &train_config)?;
    println!("{}", crate::report::format_train_summary(&summary, &train_config));
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let timestamp = crate::io::wide::parse_timestamp(&args.at)?;
    let mut predictor = Predictor::new(&args.models_dir, args.country);

    let predictions = match args.road {
        Some(road_id) => {
            let status = predictor.predict(&road_id, timestamp)?;
            vec![(road_id, status)]
        }
        None => predictor.predict_all(timestamp)?,
    };

    println!("{}", crate::report::format_predictions(timestamp, &predictions));
    Ok(())
}

pub fn ingest_config_from_args(args: &IngestArgs) -> IngestConfig {
    IngestConfig {
        data_dir: args.data_dir.clone(),
        output: args.output.clone(),
    }
}

pub fn train_config_from_args(opts: &TrainOpts) -> TrainConfig {
    TrainConfig {
        models_dir: opts.models_dir.clone(),
        country: opts.country,
        test_fraction: opts.test_size,
        split_seed: opts.seed,
        n_rounds: opts.rounds,
        learning_rate: opts.learning_rate,
        eval: opts.eval,
        jobs: opts.jobs,
    }
}
