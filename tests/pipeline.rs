use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use traffic_status::app::pipeline::{run_ingest, run_train};
use traffic_status::domain::{Country, IngestConfig, MISSING_MODEL_STATUS, TrainConfig};
use traffic_status::io::model_store::{find_model, list_model_ids};
use traffic_status::io::wide::read_wide_csv;
use traffic_status::predict::Predictor;

const HEADER: &str = "Denominació / Denominación;gid;Estat / Estado\n";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rtp-e2e-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(hour, 0, 0).unwrap()
}

/// Twelve hourly snapshots on Monday 2024-03-04.
///
/// - road 2018 alternates 0/1
/// - road 3001 is 1 then 2, with a single 3 in the last file
/// - road 55 is always 0 and missing from the 05:00 file
/// - every file carries one row without a road name
fn write_snapshots(dir: &Path) {
    for hour in 0..12u32 {
        let mut body = String::from(HEADER);
        body.push_str(&format!("Gran Via;2018;{}\n", hour % 2));
        let status_3001 = match hour {
            11 => 3,
            h if h < 6 => 1,
            _ => 2,
        };
        body.push_str(&format!("Diagonal;3001;{status_3001}\n"));
        if hour != 5 {
            body.push_str("Aragó;55;0\n");
        }
        body.push_str(";77;1\n");

        let name = format!("estat_traf04-03-2024_{hour:02}-00-00.csv");
        fs::write(dir.join(name), body).unwrap();
    }
}

#[test]
fn snapshots_to_models_to_predictions() {
    let root = scratch_dir("full");
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    write_snapshots(&data_dir);

    let ingest_config = IngestConfig {
        data_dir: data_dir.clone(),
        output: root.join("out").join("data_concat.csv"),
    };
    let ingest = run_ingest(&ingest_config).unwrap();
    assert_eq!(ingest.files_read, 12);
    assert_eq!(ingest.rows_dropped, 12);
    assert_eq!(ingest.table.rows.len(), 12);

    let wide = read_wide_csv(&ingest_config.output).unwrap();
    assert_eq!(wide, ingest.table);
    for (hour, row) in wide.rows.iter().enumerate() {
        assert_eq!(row.timestamp, at(hour as u32));
    }
    let gran_via: Vec<Option<i64>> = (0..12).map(|h| Some(h % 2)).collect();
    assert_eq!(wide.column("2018").unwrap(), gran_via);
    assert_eq!(wide.column("55").unwrap()[5], None);
    assert!(wide.column("77").is_none());

    let train_config = TrainConfig {
        models_dir: root.join("models"),
        eval: true,
        jobs: 1,
        ..TrainConfig::default()
    };
    let summary = run_train(&ingest_config.output, &train_config).unwrap();
    assert_eq!(summary.rows_used, 11);
    assert_eq!(summary.rows_dropped, 1);
    assert_eq!(summary.trained.len(), 3);
    assert!(summary.skipped.is_empty());

    let ids = list_model_ids(&train_config.models_dir).unwrap();
    assert_eq!(ids, vec!["2018".to_string(), "3001".to_string(), "55".to_string()]);

    let diagonal = find_model(&train_config.models_dir, "3001").unwrap().unwrap();
    assert_eq!(diagonal.rare_rows_dropped, 1);
    assert_eq!(diagonal.classifier.classes(), &[1, 2]);
    assert_eq!(diagonal.n_train + diagonal.n_test, 10);

    let mut predictor = Predictor::new(&train_config.models_dir, Country::Es);
    assert_eq!(predictor.predict("55", at(9)).unwrap(), 0);
    let status = predictor.predict("2018", at(9)).unwrap();
    assert!(status == 0 || status == 1);
    assert_eq!(predictor.predict("9999", at(9)).unwrap(), MISSING_MODEL_STATUS);

    let all = predictor.predict_all(at(9)).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|(_, s)| *s != MISSING_MODEL_STATUS));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn empty_snapshot_directory_is_no_data() {
    let root = scratch_dir("empty");
    let config = IngestConfig {
        data_dir: root.clone(),
        output: root.join("data_concat.csv"),
    };
    let err = run_ingest(&config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn malformed_snapshot_name_fails_ingest() {
    let root = scratch_dir("badname");
    fs::write(root.join("notes.csv"), HEADER).unwrap();
    let config = IngestConfig {
        data_dir: root.clone(),
        output: root.join("out.csv"),
    };
    let err = run_ingest(&config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn ingest_can_rerun_with_output_inside_snapshot_dir() {
    let root = scratch_dir("rerun");
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    write_snapshots(&data_dir);

    let config = IngestConfig {
        data_dir: data_dir.clone(),
        output: data_dir.join("data_concat.csv"),
    };
    let first = run_ingest(&config).unwrap();
    let second = run_ingest(&config).unwrap();
    assert_eq!(first.files_read, 12);
    assert_eq!(second.files_read, 12);
    assert_eq!(second.table, first.table);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn ingest_output_cannot_be_the_snapshot_dir() {
    let root = scratch_dir("samedir");
    write_snapshots(&root);
    let config = IngestConfig {
        data_dir: root.clone(),
        output: root.clone(),
    };
    let err = run_ingest(&config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let _ = fs::remove_dir_all(&root);
}
