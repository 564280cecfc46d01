use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::analysis::ticks::{nice_ticks, reconcile_ticks};
use crate::config::{AxisLabels, Settings};
use crate::data::filter::{apply_window, Window, WindowedContrast};
use crate::data::{calibrate, open_dataset, stitch, StitchedDataset};
use crate::error::{Result, SpectroError};

const SECONDS_PER_DAY: i64 = 24 * 3600;

// ---------------------------------------------------------------------------
// Building a stitched dataset from files
// ---------------------------------------------------------------------------

/// Open, calibrate and stitch observation files in the given order.
pub fn open_stitched(paths: &[PathBuf]) -> Result<StitchedDataset> {
    let calibrated = paths
        .iter()
        .map(|p| open_dataset(p).map(calibrate))
        .collect::<Result<Vec<_>>>()?;
    stitch(&calibrated)
}

/// The window described by the settings.
pub fn window_from(settings: &Settings) -> Window {
    Window {
        time: settings.time_range,
        frequency: settings.frequency_range,
    }
}

/// `HH:MM:SS` of an hour value, wrapping at midnight.
pub fn format_clock(hours: f64) -> String {
    let seconds = ((hours * 3600.0).round() as i64).rem_euclid(SECONDS_PER_DAY);
    (NaiveTime::default() + Duration::seconds(seconds))
        .format("%H:%M:%S")
        .to_string()
}

// ---------------------------------------------------------------------------
// Summary of one stitched observation window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

/// Everything a presentation layer needs besides the grid itself.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub title: Option<String>,
    pub files: Vec<String>,
    pub rows: usize,
    pub columns: usize,
    pub start: String,
    pub end: String,
    /// Highest and lowest channel in MHz.
    pub frequency_span: (f64, f64),
    pub labels: AxisLabels,
    pub ticks: Vec<Tick>,
    pub contrast_range: Option<(f64, f64)>,
    pub display_range: (f64, f64),
    /// Segment joins whose step does not match the cadence.
    pub discontinuities: usize,
}

/// Summarise the part of `stitched` inside the settings' window.
pub fn summarize(stitched: &StitchedDataset, settings: &Settings) -> Result<Summary> {
    let cut = apply_window(stitched, &window_from(settings));
    let (Some(&first), Some(&last)) = (cut.time_axis_hours.first(), cut.time_axis_hours.last())
    else {
        return Err(SpectroError::format("the selected window contains no time samples"));
    };

    let candidates = nice_ticks(first, last, settings.max_ticks);
    let reconciled = reconcile_ticks(&cut.time_axis_hours, &candidates)?;
    let ticks = reconciled
        .positions
        .into_iter()
        .zip(reconciled.labels)
        .map(|(position, label)| Tick { position, label })
        .collect();

    Ok(Summary {
        title: stitched.title(),
        files: stitched.names.clone(),
        rows: cut.contrast.nrows(),
        columns: cut.contrast.ncols(),
        start: format_clock(first),
        end: format_clock(last),
        frequency_span: (
            cut.frequency.first().copied().unwrap_or(f64::NAN),
            cut.frequency.last().copied().unwrap_or(f64::NAN),
        ),
        labels: settings.labels(),
        ticks,
        contrast_range: cut.range(),
        display_range: (settings.v_min, settings.v_max),
        discontinuities: stitched
            .boundaries
            .iter()
            .filter(|b| !b.is_contiguous())
            .count(),
    })
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title.as_deref().unwrap_or("<untitled>"))?;
        writeln!(f, "  files:     {}", self.files.join(", "))?;
        writeln!(f, "  grid:      {} x {}", self.rows, self.columns)?;
        writeln!(f, "  {}: {} - {}", self.labels.xlabel, self.start, self.end)?;
        writeln!(
            f,
            "  {}: {:.3} - {:.3}",
            self.labels.ylabel, self.frequency_span.0, self.frequency_span.1
        )?;
        if let Some((lo, hi)) = self.contrast_range {
            writeln!(f, "  {}: {lo:.2} .. {hi:.2}", self.labels.colorbar)?;
        }
        let labels: Vec<&str> = self.ticks.iter().map(|t| t.label.as_str()).collect();
        writeln!(f, "  ticks:     {}", labels.join("  "))?;
        if self.discontinuities > 0 {
            writeln!(f, "  warning:   {} discontinuous join(s)", self.discontinuities)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Write a contrast cut as CSV: a `frequency` column followed by one column
/// per time sample, headed by its UT in hours.
pub fn write_contrast_csv<W: Write>(cut: &WindowedContrast, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = Vec::with_capacity(cut.time_axis_hours.len() + 1);
    header.push("frequency".to_string());
    header.extend(cut.time_axis_hours.iter().map(|t| format!("{t:.6}")));
    writer.write_record(&header)?;

    for (freq, row) in cut.frequency.iter().zip(cut.contrast.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(freq.to_string());
        record.extend(row.iter().map(|v| format!("{v:.4}")));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
