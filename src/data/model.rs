use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use chrono::{NaiveTime, Timelike};
use ndarray::{s, Array2};

use crate::error::{Result, SpectroError};

/// Header key holding the observation start as `HH:MM:SS`.
pub const TIME_OBS_KEY: &str = "TIME-OBS";

/// Number of trailing frequency channels discarded at load time. The
/// instrument's lowest channels carry a known calibration artifact.
pub const DISCARDED_CHANNELS: usize = 10;

/// Length of the linear frequency resampling used as drift-fit samples.
pub const FREQ_AXIS_SAMPLES: usize = 3600;

// ---------------------------------------------------------------------------
// HeaderValue – a single header card value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value, mirroring the card types found in
/// instrument headers.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Bool(b) => write!(f, "{b}"),
            HeaderValue::Null => write!(f, "<null>"),
        }
    }
}

impl HeaderValue {
    /// Guess the type of a textual header value (CSV and Parquet metadata
    /// carry everything as text).
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return HeaderValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return HeaderValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return HeaderValue::Float(f);
        }
        if s == "true" || s == "false" {
            return HeaderValue::Bool(s == "true");
        }
        HeaderValue::String(s.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

/// Header cards of one observation: key → value.
pub type ObservationHeader = BTreeMap<String, HeaderValue>;

// ---------------------------------------------------------------------------
// TimeOfDay – parsed TIME-OBS
// ---------------------------------------------------------------------------

/// Observation start time as found in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay(pub NaiveTime);

impl TimeOfDay {
    /// Parse `HH:MM:SS`; seconds may carry a fractional part.
    pub fn parse(text: &str) -> Result<Self> {
        NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f")
            .map(TimeOfDay)
            .map_err(|e| {
                SpectroError::format(format!(
                    "{TIME_OBS_KEY} '{text}' is not formatted as HH:MM:SS: {e}"
                ))
            })
    }

    pub fn seconds_of_day(&self) -> f64 {
        self.0.num_seconds_from_midnight() as f64 + self.0.nanosecond() as f64 * 1e-9
    }
}

// ---------------------------------------------------------------------------
// RawObservation – what the file reader hands over
// ---------------------------------------------------------------------------

/// The four arrays a container exposes, before any validation.
#[derive(Debug, Clone)]
pub struct RawObservation {
    /// Digit grid, shape = (channels, samples).
    pub intensity: Array2<f64>,
    pub header: ObservationHeader,
    /// Per-column offsets in seconds.
    pub time_offsets: Vec<f64>,
    /// Per-row frequencies in MHz, including the discarded tail.
    pub frequency: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Spectrogram – read access shared by calibrated and stitched data
// ---------------------------------------------------------------------------

/// A calibrated spectrogram: a dB grid on a UT time axis.
pub trait Spectrogram {
    /// Per-row frequency in MHz, highest channel first.
    fn frequency(&self) -> &[f64];

    /// Per-column UT in hours.
    fn time_axis_hours(&self) -> &[f64];

    /// Background-subtracted intensity, shape = (rows, columns).
    fn contrast(&self) -> &Array2<f64>;

    /// Column ranges contributed by each source observation.
    fn segments(&self) -> Vec<Range<usize>> {
        vec![0..self.time_axis_hours().len()]
    }
}

// ---------------------------------------------------------------------------
// SpectrogramDataset – one validated observation
// ---------------------------------------------------------------------------

/// One observation with its derived UT axis.
#[derive(Debug, Clone)]
pub struct SpectrogramDataset {
    /// Digit grid, shape = (rows, columns). Never mutated after load.
    pub intensity: Array2<f64>,
    /// Per-row frequency in MHz, `len == rows`.
    pub frequency: Vec<f64>,
    /// Per-column offsets in seconds, `len == columns`.
    pub time_offsets: Vec<f64>,
    /// Sampling cadence in seconds.
    pub dt: f64,
    pub start_time_seconds: f64,
    /// `(start_time_seconds + dt * i) / 3600` for every column `i`.
    pub time_axis_hours: Vec<f64>,
    pub header: ObservationHeader,
    /// Source name (usually the file name), used for titles.
    pub name: Option<String>,
}

impl SpectrogramDataset {
    /// Validate the raw arrays and derive the time axis.
    ///
    /// `frequency_table` is the instrument's full table; its last
    /// [`DISCARDED_CHANNELS`] entries are dropped together with the
    /// matching grid rows.
    pub fn new(
        intensity: Array2<f64>,
        frequency_table: Vec<f64>,
        time_offsets: Vec<f64>,
        start: TimeOfDay,
    ) -> Result<Self> {
        let (rows, columns) = intensity.dim();

        if columns != time_offsets.len() {
            return Err(SpectroError::format(format!(
                "grid has {columns} columns but {} time offsets",
                time_offsets.len()
            )));
        }
        if time_offsets.len() < 2 {
            return Err(SpectroError::format(format!(
                "need at least 2 time offsets to derive the cadence, got {}",
                time_offsets.len()
            )));
        }
        if rows != frequency_table.len() {
            return Err(SpectroError::format(format!(
                "grid has {rows} rows but the frequency table has {} entries",
                frequency_table.len()
            )));
        }

        let kept = rows.saturating_sub(DISCARDED_CHANNELS);
        if kept == 0 {
            return Err(SpectroError::format(format!(
                "frequency table has {rows} channels, nothing left after discarding {DISCARDED_CHANNELS}"
            )));
        }
        let mut frequency = frequency_table;
        frequency.truncate(kept);
        let intensity = intensity.slice(s![..kept, ..]).to_owned();

        let dt = time_offsets[1] - time_offsets[0];
        let start_time_seconds = start.seconds_of_day();
        let time_axis_hours = (0..columns)
            .map(|i| (start_time_seconds + dt * i as f64) / 3600.0)
            .collect();

        Ok(SpectrogramDataset {
            intensity,
            frequency,
            time_offsets,
            dt,
            start_time_seconds,
            time_axis_hours,
            header: ObservationHeader::new(),
            name: None,
        })
    }

    /// Build a dataset from a container, consuming it. The raw arrays are
    /// released once the dataset has been derived.
    pub fn from_raw(raw: RawObservation) -> Result<Self> {
        let RawObservation {
            intensity,
            header,
            time_offsets,
            frequency,
        } = raw;

        let time_obs = header
            .get(TIME_OBS_KEY)
            .ok_or_else(|| SpectroError::format(format!("header has no {TIME_OBS_KEY} card")))?;
        let start = time_obs.as_str().map(TimeOfDay::parse).ok_or_else(|| {
            SpectroError::format(format!(
                "{TIME_OBS_KEY} must be a HH:MM:SS string, got '{time_obs}'"
            ))
        })??;

        let mut dataset = SpectrogramDataset::new(intensity, frequency, time_offsets, start)?;
        dataset.header = header;
        Ok(dataset)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rows(&self) -> usize {
        self.intensity.nrows()
    }

    pub fn columns(&self) -> usize {
        self.intensity.ncols()
    }

    /// Linear resampling of the frequency axis between its first and last
    /// channel, [`FREQ_AXIS_SAMPLES`] points long.
    pub fn freq_axis_samples(&self) -> Vec<f64> {
        freq_axis_samples(&self.frequency)
    }
}

/// [`FREQ_AXIS_SAMPLES`]-point resampling of a frequency table.
pub fn freq_axis_samples(frequency: &[f64]) -> Vec<f64> {
    match (frequency.first(), frequency.last()) {
        (Some(&first), Some(&last)) => linspace(first, last, FREQ_AXIS_SAMPLES),
        _ => Vec::new(),
    }
}

/// `n` evenly spaced values from `start` to `stop`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = stop;
            values
        }
    }
}
