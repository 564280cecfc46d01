use std::ops::Range;

use chrono::{Duration, NaiveTime};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::calibrate::{row_median, subtract_background, CalibratedDataset};
use super::model::Spectrogram;
use crate::error::{Result, SpectroError};

/// Join between two consecutive segments of a stitched time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBoundary {
    /// Index of the segment that starts at this boundary.
    pub segment: usize,
    /// First column of that segment in the stitched grid.
    pub column: usize,
    /// Seconds between the last sample before the boundary and the first
    /// sample after it. Negative when the inputs were out of order.
    pub step_seconds: f64,
    /// Cadence of the segment before the boundary.
    pub expected_seconds: f64,
}

impl SegmentBoundary {
    /// Whether the step across the boundary matches the sampling cadence.
    pub fn is_contiguous(&self) -> bool {
        (self.step_seconds - self.expected_seconds).abs() <= 0.5 * self.expected_seconds.abs()
    }
}

/// Several observations joined along the time axis.
#[derive(Debug, Clone)]
pub struct StitchedDataset {
    pub frequency: Vec<f64>,
    pub time_axis_hours: Vec<f64>,
    pub db: Array2<f64>,
    /// Background over the whole stitched window.
    pub db_median: Array1<f64>,
    pub contrast: Array2<f64>,
    /// Source names in stitch order, empty when the inputs carry none.
    pub names: Vec<String>,
    pub boundaries: Vec<SegmentBoundary>,
    segment_columns: Vec<usize>,
}

/// Concatenate calibrated datasets in the given order.
///
/// The order is trusted: inputs are neither sorted nor checked for a
/// monotonic time axis. Boundaries that are not contiguous are reported in
/// [`StitchedDataset::boundaries`] and logged.
pub fn stitch(datasets: &[CalibratedDataset]) -> Result<StitchedDataset> {
    let first = datasets.first().ok_or(SpectroError::EmptyInput)?;
    let frequency = first.dataset.frequency.clone();

    for (index, ds) in datasets.iter().enumerate().skip(1) {
        check_band(&frequency, &ds.dataset.frequency, index)?;
        if ds.dataset.dt != first.dataset.dt {
            log::warn!(
                "Dataset {index} samples every {} s, the first every {} s",
                ds.dataset.dt,
                first.dataset.dt
            );
        }
    }

    let named = datasets.iter().filter(|ds| ds.dataset.name.is_some()).count();
    if named != 0 && named != datasets.len() {
        let index = datasets
            .iter()
            .position(|ds| ds.dataset.name.is_none())
            .unwrap_or_default();
        return Err(SpectroError::format(format!(
            "dataset {index} has no name; either every input is named or none is"
        )));
    }

    let views: Vec<ArrayView2<f64>> = datasets.iter().map(|ds| ds.db.view()).collect();
    let db = ndarray::concatenate(Axis(1), &views).map_err(|e| {
        SpectroError::format(format!("cannot concatenate dB grids: {e}"))
    })?;

    let time_axis_hours: Vec<f64> = datasets
        .iter()
        .flat_map(|ds| ds.dataset.time_axis_hours.iter().copied())
        .collect();
    let segment_columns: Vec<usize> = datasets.iter().map(|ds| ds.dataset.columns()).collect();
    let boundaries = find_boundaries(datasets);

    let db_median = row_median(&db);
    let contrast = subtract_background(&db, &db_median);
    let names = datasets
        .iter()
        .filter_map(|ds| ds.dataset.name.clone())
        .collect();

    log::info!(
        "Stitched {} observation(s) into a {}x{} grid",
        datasets.len(),
        db.nrows(),
        db.ncols()
    );

    Ok(StitchedDataset {
        frequency,
        time_axis_hours,
        db,
        db_median,
        contrast,
        names,
        boundaries,
        segment_columns,
    })
}

fn check_band(reference: &[f64], candidate: &[f64], index: usize) -> Result<()> {
    if reference.len() != candidate.len() {
        return Err(SpectroError::IncompatibleBand {
            index,
            reason: format!(
                "{} channels, expected {}",
                candidate.len(),
                reference.len()
            ),
        });
    }
    if let Some(channel) = reference
        .iter()
        .zip(candidate)
        .position(|(a, b)| a != b)
    {
        return Err(SpectroError::IncompatibleBand {
            index,
            reason: format!(
                "channel {channel} is {} MHz, expected {} MHz",
                candidate[channel], reference[channel]
            ),
        });
    }
    Ok(())
}

fn find_boundaries(datasets: &[CalibratedDataset]) -> Vec<SegmentBoundary> {
    let mut boundaries = Vec::new();
    let mut column = 0;
    for (segment, pair) in datasets.windows(2).enumerate() {
        let (before, after) = (&pair[0].dataset, &pair[1].dataset);
        column += before.columns();
        let (Some(last), Some(next)) = (before.time_axis_hours.last(), after.time_axis_hours.first())
        else {
            continue;
        };
        let boundary = SegmentBoundary {
            segment: segment + 1,
            column,
            step_seconds: (next - last) * 3600.0,
            expected_seconds: before.dt,
        };
        if boundary.step_seconds <= 0.0 {
            log::warn!(
                "Time axis runs backwards at column {column} ({:.3} s); inputs are not in chronological order",
                boundary.step_seconds
            );
        } else if !boundary.is_contiguous() {
            log::warn!(
                "Gap of {:.3} s at column {column}, cadence is {:.3} s",
                boundary.step_seconds,
                boundary.expected_seconds
            );
        } else {
            log::debug!("Contiguous boundary at column {column}");
        }
        boundaries.push(boundary);
    }
    boundaries
}

impl StitchedDataset {
    pub fn rows(&self) -> usize {
        self.db.nrows()
    }

    pub fn columns(&self) -> usize {
        self.db.ncols()
    }

    /// Title derived from the first and last source names and the final UT,
    /// when the sources carry names.
    pub fn title(&self) -> Option<String> {
        let final_hour = *self.time_axis_hours.last()?;
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        stitched_title(&names, final_hour)
    }
}

impl Spectrogram for StitchedDataset {
    fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    fn time_axis_hours(&self) -> &[f64] {
        &self.time_axis_hours
    }

    fn contrast(&self) -> &Array2<f64> {
        &self.contrast
    }

    fn segments(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.segment_columns
            .iter()
            .map(|&n| {
                let range = start..start + n;
                start += n;
                range
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Build a title from observation file names of the form
/// `STATION_DATE_HHMMSS_BAND.ext`:
/// `<first name without its band>_<final HHMMSS>_<band of last name>`.
///
/// `final_hour` is rounded to two decimals before formatting.
pub fn stitched_title(names: &[&str], final_hour: f64) -> Option<String> {
    let first = names.first()?;
    let last = names.last()?;

    let first_fields: Vec<&str> = first.split('_').collect();
    if first_fields.len() < 2 {
        return None;
    }
    let prefix = first_fields[..first_fields.len() - 1].join("_");
    let band = last.rsplit('_').next()?.split('.').next()?;

    let seconds = ((round_to(final_hour, 2) * 3600.0).round() as i64).rem_euclid(24 * 3600);
    let end = NaiveTime::default() + Duration::seconds(seconds);
    Some(format!("{prefix}_{}_{band}", end.format("%H%M%S")))
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::calibrate::calibrate;
    use crate::data::model::{SpectrogramDataset, TimeOfDay};
    use proptest::prelude::*;

    fn calibrated(start: &str, columns: usize, frequency: &[f64], gain: f64) -> CalibratedDataset {
        let rows = frequency.len();
        let mut table = frequency.to_vec();
        table.extend((1..=10).map(|i| frequency[rows - 1] - i as f64));
        let grid = Array2::from_shape_fn((rows + 10, columns), |(r, c)| {
            ((r * 7 + c * 3) % 11) as f64 * (1.0 + gain)
        });
        let ds = SpectrogramDataset::new(
            grid,
            table,
            (0..columns).map(|c| c as f64 * 0.25).collect(),
            TimeOfDay::parse(start).unwrap(),
        )
        .unwrap();
        calibrate(ds)
    }

    fn band() -> Vec<f64> {
        (0..17).map(|i| 180.0 - i as f64 * 10.0).collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(stitch(&[]).unwrap_err(), SpectroError::EmptyInput));
    }

    #[test]
    fn stitching_adds_columns() {
        let a = calibrated("08:00:00", 12, &band(), 0.0);
        let b = calibrated("08:00:03", 20, &band(), 40.0);
        let st = stitch(&[a, b]).unwrap();
        assert_eq!(st.columns(), 32);
        assert_eq!(st.rows(), 17);
        assert_eq!(st.time_axis_hours.len(), 32);
        assert_eq!(st.segments(), vec![0..12, 12..32]);
        assert_eq!(st.boundaries.len(), 1);
        assert!(st.boundaries[0].is_contiguous());
        assert_eq!(st.boundaries[0].column, 12);
    }

    #[test]
    fn single_dataset_keeps_shape() {
        let a = calibrated("08:00:00", 12, &band(), 0.0);
        let shape = a.db.dim();
        let st = stitch(std::slice::from_ref(&a)).unwrap();
        assert_eq!(st.db.dim(), shape);
        assert_eq!(st.db_median, a.db_median);
        assert_eq!(st.contrast, a.contrast);
        assert!(st.boundaries.is_empty());
    }

    #[test]
    fn median_is_recomputed_over_the_whole_window() {
        let a = calibrated("08:00:00", 10, &band(), 0.0);
        let b = calibrated("08:00:02.5", 30, &band(), 100.0);
        let st = stitch(&[a.clone(), b]).unwrap();
        assert_ne!(st.db_median, a.db_median);
        let expected = row_median(&st.db);
        assert_eq!(st.db_median, expected);
    }

    #[test]
    fn differing_bands_are_incompatible() {
        let a = calibrated("08:00:00", 10, &band(), 0.0);
        let mut other = band();
        other[3] += 0.5;
        let b = calibrated("08:00:02.5", 10, &other, 0.0);
        let err = stitch(&[a.clone(), b]).unwrap_err();
        assert!(matches!(err, SpectroError::IncompatibleBand { index: 1, .. }));

        let c = calibrated("08:00:02.5", 10, &band()[..16], 0.0);
        let err = stitch(&[a, c]).unwrap_err();
        assert!(matches!(err, SpectroError::IncompatibleBand { index: 1, .. }));
    }

    #[test]
    fn names_are_all_or_nothing() {
        let named = |start: &str| {
            let mut cal = calibrated(start, 10, &band(), 0.0);
            cal.dataset.name = Some(format!("STN_20240101_{}_01.csv", start.replace(':', "")));
            cal
        };
        let a = named("08:00:00");
        let b = calibrated("08:00:02.5", 10, &band(), 0.0);
        let c = named("08:00:05");
        let err = stitch(&[a.clone(), b.clone(), c.clone()]).unwrap_err();
        assert!(matches!(err, SpectroError::Format(ref msg) if msg.contains("dataset 1")));

        let st = stitch(&[a, c]).unwrap();
        assert_eq!(st.names.len(), 2);
        let anonymous = stitch(&[b.clone(), b]).unwrap();
        assert!(anonymous.names.is_empty());
        assert_eq!(anonymous.title(), None);
    }

    #[test]
    fn out_of_order_inputs_are_kept_in_caller_order() {
        let late = calibrated("09:00:00", 10, &band(), 0.0);
        let early = calibrated("08:00:00", 10, &band(), 0.0);
        let st = stitch(&[late, early]).unwrap();
        assert!(st.time_axis_hours[10] < st.time_axis_hours[9]);
        assert!(st.boundaries[0].step_seconds < 0.0);
        assert!(!st.boundaries[0].is_contiguous());
    }

    #[test]
    fn title_from_file_names() {
        let names = [
            "BLEN7M_20110809_080004_25.fit.gz",
            "BLEN7M_20110809_081504_25.fit.gz",
        ];
        // 8:29:24 after rounding 8.4899 to 8.49 h
        assert_eq!(
            stitched_title(&names, 8.4899).as_deref(),
            Some("BLEN7M_20110809_080004_082924_25")
        );
        assert_eq!(stitched_title(&[], 8.0), None);
        assert_eq!(stitched_title(&["nounderscore.fit"], 8.0), None);
    }

    proptest! {
        #[test]
        fn stitched_columns_are_the_sum(m in 2usize..40, n in 2usize..40) {
            let a = calibrated("10:00:00", m, &band(), 0.0);
            let b = calibrated("10:30:00", n, &band(), 5.0);
            let st = stitch(&[a, b]).unwrap();
            prop_assert_eq!(st.columns(), m + n);
            prop_assert_eq!(st.rows(), band().len());
            prop_assert_eq!(st.contrast.dim(), (band().len(), m + n));
        }
    }
}
