use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use rusty_callisto::analysis::{fit_drift, front_velocity, reconcile_ticks, DriftModel};
use rusty_callisto::data::model::freq_axis_samples;
use rusty_callisto::data::{calibrate, open_dataset, stitch, Spectrogram};
use rusty_callisto::report::open_stitched;
use rusty_callisto::SpectroError;

/// Raw channels written per file; the loader keeps the first ten.
const RAW_CHANNELS: usize = 20;

fn frequency_table(top: f64) -> Vec<f64> {
    (0..RAW_CHANNELS).map(|i| top - 5.0 * i as f64).collect()
}

fn digits(columns: usize, seed: usize) -> Vec<Vec<f64>> {
    (0..RAW_CHANNELS)
        .map(|r| {
            (0..columns)
                .map(|c| ((r * 31 + c * 7 + seed) % 200) as f64 + 20.0)
                .collect()
        })
        .collect()
}

fn write_json(dir: &Path, name: &str, time_obs: &str, columns: usize, dt: f64, top: f64) -> PathBuf {
    let path = dir.join(name);
    let doc = serde_json::json!({
        "header": { "TIME-OBS": time_obs, "INSTRUME": "TEST" },
        "intensity": digits(columns, name.len()),
        "time": (0..columns).map(|i| i as f64 * dt).collect::<Vec<_>>(),
        "frequency": frequency_table(top),
    });
    serde_json::to_writer(File::create(&path).unwrap(), &doc).unwrap();
    path
}

fn write_csv(dir: &Path, name: &str, time_obs: &str, columns: usize, dt: f64, top: f64) -> PathBuf {
    let path = dir.join(name);
    let mut w = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&path)
        .unwrap();
    w.write_record(["TIME-OBS", time_obs]).unwrap();
    let mut time_row = vec!["frequency".to_string()];
    time_row.extend((0..columns).map(|i| (i as f64 * dt).to_string()));
    w.write_record(&time_row).unwrap();
    for (f, row) in frequency_table(top).iter().zip(digits(columns, 3)) {
        let mut record = vec![f.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        w.write_record(&record).unwrap();
    }
    w.flush().unwrap();
    path
}

fn write_parquet(dir: &Path, name: &str, time_obs: &str, columns: usize, dt: f64, top: f64) -> PathBuf {
    let path = dir.join(name);
    let offsets: Vec<f64> = (0..columns).map(|i| i as f64 * dt).collect();

    let mut intensity = ListBuilder::new(Float64Builder::new());
    for row in digits(columns, 11) {
        intensity.values().append_slice(&row);
        intensity.append(true);
    }
    let schema = Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("frequency", DataType::Float64, false),
            Field::new(
                "intensity",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                false,
            ),
        ],
        [
            ("TIME-OBS".to_string(), time_obs.to_string()),
            ("TIME-OFFSETS".to_string(), serde_json::to_string(&offsets).unwrap()),
            ("NAXIS1".to_string(), columns.to_string()),
        ]
        .into_iter()
        .collect(),
    ));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(frequency_table(top))),
            Arc::new(intensity.finish()),
        ],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
}

#[test]
fn mixed_containers_stitch_in_given_order() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(dir.path(), "TEST_20240101_100000_01.parquet", "10:00:00", 6, 1.0, 400.0);
    let b = write_csv(dir.path(), "TEST_20240101_100006_01.csv", "10:00:06", 4, 1.0, 400.0);
    let c = write_json(dir.path(), "TEST_20240101_100010_01.json", "10:00:10", 5, 1.0, 400.0);

    let stitched = open_stitched(&[a, b, c]).unwrap();
    assert_eq!(stitched.rows(), RAW_CHANNELS - 10);
    assert_eq!(stitched.columns(), 15);
    assert_eq!(stitched.segments(), vec![0..6, 6..10, 10..15]);
    assert!(stitched.boundaries.iter().all(|b| b.is_contiguous()));
    assert_eq!(stitched.time_axis_hours[0], 10.0);
    assert_eq!(stitched.time_axis_hours[14], (36000.0 + 14.0) / 3600.0);
    assert_eq!(stitched.frequency.len(), 10);
    assert_eq!(stitched.frequency[9], 355.0);
}

#[test]
fn parquet_header_cards_survive() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "TEST.parquet", "08:00:04", 3, 0.25, 870.0);
    let ds = open_dataset(&path).unwrap();
    assert_eq!(ds.dt, 0.25);
    assert_eq!(ds.start_time_seconds, 8.0 * 3600.0 + 4.0);
    assert_eq!(ds.header.get("NAXIS1").and_then(|v| v.as_f64()), Some(3.0));
    assert_eq!(ds.name.as_deref(), Some("TEST.parquet"));
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = open_dataset(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SpectroError::FileNotFound(_)));
}

#[test]
fn malformed_time_obs_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_json(dir.path(), "bad.json", "8h00", 3, 1.0, 400.0);
    match open_dataset(&path).unwrap_err() {
        SpectroError::Format(msg) => assert!(msg.contains("bad.json")),
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn stitching_different_bands_fails() {
    let dir = TempDir::new().unwrap();
    let a = write_json(dir.path(), "a.json", "10:00:00", 4, 1.0, 400.0);
    let b = write_json(dir.path(), "b.json", "10:00:04", 4, 1.0, 800.0);
    let err = open_stitched(&[a, b]).unwrap_err();
    assert!(matches!(err, SpectroError::IncompatibleBand { index: 1, .. }));
}

#[test]
fn empty_file_list_fails() {
    assert!(matches!(open_stitched(&[]).unwrap_err(), SpectroError::EmptyInput));
}

#[test]
fn ticks_over_two_half_hour_files() {
    let dir = TempDir::new().unwrap();
    let a = write_csv(dir.path(), "a.csv", "10:00:00", 30, 60.0, 400.0);
    let b = write_csv(dir.path(), "b.csv", "10:30:00", 31, 60.0, 400.0);
    let stitched = open_stitched(&[a, b]).unwrap();
    assert_eq!(*stitched.time_axis_hours.last().unwrap(), 11.0);

    let candidates = [10.0, 10.2, 10.4, 10.6, 10.8, 11.0];
    let ticks = reconcile_ticks(&stitched.time_axis_hours, &candidates).unwrap();
    assert_eq!(ticks.positions, candidates.to_vec());
    assert_eq!(
        ticks.labels,
        vec!["10:00", "10:12", "10:24", "10:36", "10:48", "11:00"]
    );
}

#[test]
fn drift_and_velocity_from_stitched_files() {
    let dir = TempDir::new().unwrap();
    let a = write_json(dir.path(), "a.json", "08:00:04", 3600, 0.25, 200.0);
    let b = write_json(dir.path(), "b.json", "08:15:04", 3600, 0.25, 200.0);

    let parts: Vec<_> = [a, b]
        .iter()
        .map(|p| calibrate(open_dataset(p).unwrap()))
        .collect();
    let single = DriftModel::from_spectrogram(&parts[0]).unwrap();
    // One segment pairs a linear time axis with a linear frequency ramp:
    // 200 → 155 MHz over 3599 quarter seconds.
    let expected_slope = (155.0 - 200.0) / (3599.0 * 0.25 / 3600.0);
    assert!((single.slope - expected_slope).abs() < 1e-6 * expected_slope.abs());

    let stitched = stitch(&parts).unwrap();
    let model = DriftModel::from_spectrogram(&stitched).unwrap();
    let samples = freq_axis_samples(&stitched.frequency);
    let freqs: Vec<f64> = samples.iter().chain(samples.iter()).copied().collect();
    let reference = fit_drift(&stitched.time_axis_hours, &freqs).unwrap();
    assert!((model.slope - reference.slope).abs() < 1e-9 * reference.slope.abs());
    assert!((model.intercept - reference.intercept).abs() < 1e-9 * reference.intercept.abs());

    let front = front_velocity(&model, 8.05, 8.4).unwrap();
    assert_eq!(front.time_diff, Some((8.4 - 8.05) * 3600.0));
    assert!(front.freq_diff.unwrap() > 0.0);

    assert!(matches!(
        front_velocity(&model, 8.2, 8.2).unwrap_err(),
        SpectroError::DegenerateInterval { .. }
    ));
}
