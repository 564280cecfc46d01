use ndarray::{Array1, Array2, Axis};

use super::model::{Spectrogram, SpectrogramDataset};

/// Full-scale range of the 8-bit ADC.
pub const DIGIT_FULL_SCALE: f64 = 255.0;
/// Reference voltage in millivolts at full scale.
pub const REFERENCE_MILLIVOLTS: f64 = 2500.0;
/// Millivolts per dB of the detector's logarithmic response.
pub const MILLIVOLTS_PER_DB: f64 = 25.4;

/// Convert raw ADC digits to millivolts.
pub fn digits_to_voltage(digits: f64) -> f64 {
    digits / DIGIT_FULL_SCALE * REFERENCE_MILLIVOLTS
}

/// Convert a raw digit grid to dB relative to its own minimum.
pub fn digits_to_db(intensity: &Array2<f64>) -> Array2<f64> {
    let min = intensity.iter().copied().fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        // empty grid
        return intensity.clone();
    }
    intensity.mapv(|d| digits_to_voltage(d - min) / MILLIVOLTS_PER_DB)
}

/// Median of each row. An even count averages the two middle values.
pub fn row_median(grid: &Array2<f64>) -> Array1<f64> {
    grid.map_axis(Axis(1), |row| {
        let mut values = row.to_vec();
        median_in_place(&mut values)
    })
}

fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// `db - median` with the per-row median broadcast across columns.
pub fn subtract_background(db: &Array2<f64>, median: &Array1<f64>) -> Array2<f64> {
    db - &median.view().insert_axis(Axis(1))
}

// ---------------------------------------------------------------------------
// CalibratedDataset
// ---------------------------------------------------------------------------

/// A dataset with its dB grid, background and contrast.
#[derive(Debug, Clone)]
pub struct CalibratedDataset {
    pub dataset: SpectrogramDataset,
    pub db: Array2<f64>,
    /// Per-row background estimate.
    pub db_median: Array1<f64>,
    /// `db - db_median`.
    pub contrast: Array2<f64>,
}

/// Calibrate one observation. A constant grid is valid and yields an
/// all-zero contrast.
pub fn calibrate(dataset: SpectrogramDataset) -> CalibratedDataset {
    let db = digits_to_db(&dataset.intensity);
    let db_median = row_median(&db);
    let contrast = subtract_background(&db, &db_median);
    log::debug!(
        "Calibrated {} ({}x{})",
        dataset.name.as_deref().unwrap_or("<unnamed>"),
        db.nrows(),
        db.ncols()
    );
    CalibratedDataset {
        dataset,
        db,
        db_median,
        contrast,
    }
}

impl Spectrogram for CalibratedDataset {
    fn frequency(&self) -> &[f64] {
        &self.dataset.frequency
    }

    fn time_axis_hours(&self) -> &[f64] {
        &self.dataset.time_axis_hours
    }

    fn contrast(&self) -> &Array2<f64> {
        &self.contrast
    }
}
