use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{HeaderValue, ObservationHeader, RawObservation, SpectrogramDataset, TIME_OBS_KEY};
use crate::error::{Result, SpectroError};

/// Arrow schema metadata key holding the per-column time offsets as a JSON
/// array.
pub const TIME_OFFSETS_KEY: &str = "TIME-OFFSETS";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an observation container from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per channel, `frequency` + `intensity` list columns
/// * `.json`    – `{ "header": {...}, "intensity": [[...]], "time": [...], "frequency": [...] }`
/// * `.csv`     – header cards, then a time row, then one row per channel
pub fn load_observation(path: &Path) -> Result<RawObservation> {
    if !path.is_file() {
        return Err(SpectroError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let raw = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => Err(SpectroError::format(format!(
            "unsupported file extension: .{other}"
        ))),
    }
    .map_err(|e| content_error(path, e))?;

    log::info!(
        "Loaded {} ({} channels x {} samples)",
        path.display(),
        raw.intensity.nrows(),
        raw.intensity.ncols()
    );
    Ok(raw)
}

/// Decoding failures become `Format` errors naming the file; failures of the
/// file system itself stay `Io`.
fn content_error(path: &Path, err: SpectroError) -> SpectroError {
    let detail = match &err {
        SpectroError::Json(e) => e.to_string(),
        SpectroError::Csv(e) if !matches!(e.kind(), csv::ErrorKind::Io(_)) => e.to_string(),
        SpectroError::Parquet(e) => e.to_string(),
        SpectroError::Arrow(e) => e.to_string(),
        SpectroError::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => e.to_string(),
        _ => return err,
    };
    SpectroError::Format(format!("{}: {detail}", path.display()))
}

/// Load and validate one observation. The raw container is dropped before
/// this returns; only the derived dataset survives.
pub fn open_dataset(path: &Path) -> Result<SpectrogramDataset> {
    let raw = load_observation(path)?;
    let dataset = SpectrogramDataset::from_raw(raw).map_err(|e| match e {
        SpectroError::Format(msg) => SpectroError::Format(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(dataset.with_name(name))
}

fn grid_from_rows(rows: Vec<Vec<f64>>, what: &str) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(SpectroError::format(format!(
            "{what}: row {i} has {} values, row 0 has {n_cols}",
            row.len()
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| SpectroError::format(format!("{what}: {e}")))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonObservation {
    #[serde(default)]
    header: BTreeMap<String, JsonValue>,
    intensity: Vec<Vec<f64>>,
    time: Vec<f64>,
    frequency: Vec<f64>,
}

/// Expected JSON schema:
///
/// ```json
/// {
///   "header": { "TIME-OBS": "08:00:04", "INSTRUME": "BLEN7M" },
///   "intensity": [[143, 150, ...], ...],
///   "time": [0.0, 0.25, ...],
///   "frequency": [870.0, 866.0, ...]
/// }
/// ```
fn load_json(path: &Path) -> Result<RawObservation> {
    let text = std::fs::read_to_string(path)?;
    let obs: JsonObservation = serde_json::from_str(&text)
        .map_err(|e| SpectroError::format(format!("{}: {e}", path.display())))?;

    let header = obs
        .header
        .iter()
        .map(|(k, v)| (k.clone(), json_to_header(v)))
        .collect();

    Ok(RawObservation {
        intensity: grid_from_rows(obs.intensity, "intensity")?,
        header,
        time_offsets: obs.time,
        frequency: obs.frequency,
    })
}

fn json_to_header(val: &JsonValue) -> HeaderValue {
    match val {
        JsonValue::String(s) => HeaderValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                HeaderValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => HeaderValue::Bool(*b),
        JsonValue::Null => HeaderValue::Null,
        other => HeaderValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout (no header row, records of varying length):
///   `TIME-OBS,08:00:04`        header cards, one `KEY,VALUE` per record
///   `frequency,0.0,0.25,...`   time offsets
///   `870.0,143,150,...`        one record per channel: frequency, digits
fn load_csv(path: &Path) -> Result<RawObservation> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut header = ObservationHeader::new();
    let mut time_offsets: Option<Vec<f64>> = None;
    let mut frequency = Vec::new();
    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let first = record.get(0).unwrap_or("");

        if time_offsets.is_none() {
            if first == "frequency" {
                time_offsets = Some(parse_floats(record.iter().skip(1), row_no)?);
            } else {
                let value = record.get(1).unwrap_or("");
                let value = if first == TIME_OBS_KEY {
                    HeaderValue::String(value.to_string())
                } else {
                    HeaderValue::guess(value)
                };
                header.insert(first.to_string(), value);
            }
            continue;
        }

        let f = first.parse::<f64>().map_err(|_| {
            SpectroError::format(format!(
                "CSV row {row_no}: frequency '{first}' is not a number"
            ))
        })?;
        frequency.push(f);
        rows.push(parse_floats(record.iter().skip(1), row_no)?);
    }

    let time_offsets = time_offsets
        .ok_or_else(|| SpectroError::format("CSV has no 'frequency,<time offsets>' record"))?;

    Ok(RawObservation {
        intensity: grid_from_rows(rows, "CSV intensity")?,
        header,
        time_offsets,
        frequency,
    })
}

fn parse_floats<'a>(tokens: impl Iterator<Item = &'a str>, row: usize) -> Result<Vec<f64>> {
    tokens
        .enumerate()
        .map(|(j, tok)| {
            tok.parse::<f64>().map_err(|_| {
                SpectroError::format(format!("CSV row {row}, field {}: '{tok}' is not a number", j + 1))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing one observation.
///
/// Expected schema:
/// - `frequency`: Float64 or Float32 – channel frequency in MHz
/// - `intensity`: List<Float64> or LargeList<Float64> – digits of that channel
/// - schema metadata `TIME-OBS` and `TIME-OFFSETS`; any other metadata key is
///   kept as a header card
fn load_parquet(path: &Path) -> Result<RawObservation> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let metadata = builder.schema().metadata().clone();
    let mut header = ObservationHeader::new();
    let mut time_offsets = None;
    for (key, value) in metadata {
        match key.as_str() {
            TIME_OFFSETS_KEY => {
                let offsets: Vec<f64> = serde_json::from_str(&value).map_err(|e| {
                    SpectroError::format(format!("{TIME_OFFSETS_KEY} metadata: {e}"))
                })?;
                time_offsets = Some(offsets);
            }
            // Arrow's own serialized schema
            "ARROW:schema" => {}
            TIME_OBS_KEY => {
                header.insert(key, HeaderValue::String(value));
            }
            _ => {
                header.insert(key, HeaderValue::guess(&value));
            }
        }
    }
    let time_offsets = time_offsets.ok_or_else(|| {
        SpectroError::format(format!("Parquet file has no {TIME_OFFSETS_KEY} metadata"))
    })?;

    let reader = builder.build()?;
    let mut frequency = Vec::new();
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let f_idx = schema
            .index_of("frequency")
            .map_err(|_| SpectroError::format("Parquet file missing 'frequency' column"))?;
        let i_idx = schema
            .index_of("intensity")
            .map_err(|_| SpectroError::format("Parquet file missing 'intensity' column"))?;

        let f_col = batch.column(f_idx);
        let i_col = batch.column(i_idx);

        for row in 0..batch.num_rows() {
            frequency.push(extract_f64(f_col, row)?);
            rows.push(extract_f64_list(i_col, row)?);
        }
    }

    Ok(RawObservation {
        intensity: grid_from_rows(rows, "Parquet intensity")?,
        header,
        time_offsets,
        frequency,
    })
}

// -- Parquet / Arrow helpers --

fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<f64> {
    if col.is_null(row) {
        return Err(SpectroError::format(format!("row {row}: null frequency")));
    }
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.value(row) as f64)
    } else {
        Err(SpectroError::format(format!(
            "frequency column is {:?}, expected Float64 or Float32",
            col.data_type()
        )))
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        return Err(SpectroError::format(format!("row {row}: null intensity list")));
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| SpectroError::format("expected ListArray"))?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .ok_or_else(|| SpectroError::format("expected LargeListArray"))?
            .value(row),
        other => {
            return Err(SpectroError::format(format!(
                "expected List or LargeList intensity column, got {other:?}"
            )))
        }
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        Err(SpectroError::format(format!(
            "intensity list inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let err = load_observation(Path::new("NOT_HERE_BLEN7M_20110809_080004_25.json")).unwrap_err();
        assert!(matches!(err, SpectroError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension() {
        let file = temp_file(".png", "not a spectrogram");
        let err = load_observation(file.path()).unwrap_err();
        assert!(matches!(err, SpectroError::Format(_)));
    }

    #[test]
    fn json_observation() {
        let file = temp_file(
            ".json",
            r#"{
                "header": { "TIME-OBS": "08:00:04", "NAXIS1": 3, "INSTRUME": "BLEN7M" },
                "intensity": [[1, 2, 3], [4, 5, 6]],
                "time": [0.0, 0.25, 0.5],
                "frequency": [870.0, 866.0]
            }"#,
        );
        let raw = load_observation(file.path()).unwrap();
        assert_eq!(raw.intensity.dim(), (2, 3));
        assert_eq!(raw.intensity[[1, 2]], 6.0);
        assert_eq!(raw.header.get("NAXIS1"), Some(&HeaderValue::Integer(3)));
        assert_eq!(
            raw.header.get(TIME_OBS_KEY),
            Some(&HeaderValue::String("08:00:04".into()))
        );
        assert_eq!(raw.time_offsets, vec![0.0, 0.25, 0.5]);
    }

    #[test]
    fn ragged_json_grid_is_a_format_error() {
        let file = temp_file(
            ".json",
            r#"{ "intensity": [[1, 2, 3], [4, 5]], "time": [0, 1, 2], "frequency": [1, 2] }"#,
        );
        assert!(matches!(
            load_observation(file.path()).unwrap_err(),
            SpectroError::Format(_)
        ));
    }

    #[test]
    fn csv_observation() {
        let file = temp_file(
            ".csv",
            "TIME-OBS,08:00:04\nINSTRUME,BLEN7M\nfrequency,0.0,0.25,0.5\n870.0,1,2,3\n866.0,4,5,6\n",
        );
        let raw = load_observation(file.path()).unwrap();
        assert_eq!(raw.frequency, vec![870.0, 866.0]);
        assert_eq!(raw.time_offsets, vec![0.0, 0.25, 0.5]);
        assert_eq!(raw.intensity[[0, 1]], 2.0);
        assert_eq!(
            raw.header.get("INSTRUME"),
            Some(&HeaderValue::String("BLEN7M".into()))
        );
    }

    fn temp_bytes(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content).unwrap();
        file
    }

    fn assert_format_error(path: &Path) {
        match load_observation(path).unwrap_err() {
            SpectroError::Format(msg) => assert!(msg.contains(&path.display().to_string()), "{msg}"),
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_parquet_is_a_format_error() {
        let file = temp_bytes(".parquet", b"PAR1 this is not a parquet footer");
        assert_format_error(file.path());
    }

    #[test]
    fn non_utf8_csv_is_a_format_error() {
        let file = temp_bytes(".csv", b"\xff\xfeTIME-OBS,08:00:04\nfrequency,0,1\n870,1,2\n");
        assert_format_error(file.path());
    }

    #[test]
    fn non_utf8_json_is_a_format_error() {
        let file = temp_bytes(".json", b"{ \"header\": \xff\xfe }");
        assert_format_error(file.path());
    }

    #[test]
    fn csv_without_time_row() {
        let file = temp_file(".csv", "TIME-OBS,08:00:04\n");
        assert!(matches!(
            load_observation(file.path()).unwrap_err(),
            SpectroError::Format(_)
        ));
    }

    #[test]
    fn csv_with_bad_digit() {
        let file = temp_file(".csv", "TIME-OBS,08:00:04\nfrequency,0,1\n870,1,x\n");
        assert!(matches!(
            load_observation(file.path()).unwrap_err(),
            SpectroError::Format(_)
        ));
    }
}
