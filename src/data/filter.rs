use ndarray::{Array2, Axis};

use super::model::Spectrogram;

// ---------------------------------------------------------------------------
// Window predicate: which rows / columns of a spectrogram are kept
// ---------------------------------------------------------------------------

/// Time and frequency limits. An absent limit means "no filter" (keep all).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Window {
    /// `[start, end]` UT in hours, either order.
    pub time: Option<(f64, f64)>,
    /// `[low, high]` in MHz, either order.
    pub frequency: Option<(f64, f64)>,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.frequency.is_none()
    }
}

fn within(value: f64, range: Option<(f64, f64)>) -> bool {
    match range {
        None => true,
        Some((a, b)) => value >= a.min(b) && value <= a.max(b),
    }
}

/// Return indices of rows whose frequency lies inside the window.
pub fn row_indices(frequency: &[f64], window: &Window) -> Vec<usize> {
    frequency
        .iter()
        .enumerate()
        .filter(|&(_, &f)| within(f, window.frequency))
        .map(|(i, _)| i)
        .collect()
}

/// Return indices of columns whose UT lies inside the window.
pub fn column_indices(time_axis_hours: &[f64], window: &Window) -> Vec<usize> {
    time_axis_hours
        .iter()
        .enumerate()
        .filter(|&(_, &t)| within(t, window.time))
        .map(|(i, _)| i)
        .collect()
}

/// A rectangular cut of a spectrogram's contrast grid with matching axes.
#[derive(Debug, Clone)]
pub struct WindowedContrast {
    pub frequency: Vec<f64>,
    pub time_axis_hours: Vec<f64>,
    pub contrast: Array2<f64>,
}

impl WindowedContrast {
    pub fn is_empty(&self) -> bool {
        self.contrast.is_empty()
    }

    /// Minimum and maximum contrast, `None` for an empty cut.
    pub fn range(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let (min, max) = self
            .contrast
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Some((min, max))
    }
}

/// Cut `spectrogram` down to the rows and columns inside `window`.
pub fn apply_window<S: Spectrogram + ?Sized>(spectrogram: &S, window: &Window) -> WindowedContrast {
    if window.is_empty() {
        return WindowedContrast {
            frequency: spectrogram.frequency().to_vec(),
            time_axis_hours: spectrogram.time_axis_hours().to_vec(),
            contrast: spectrogram.contrast().clone(),
        };
    }

    let rows = row_indices(spectrogram.frequency(), window);
    let cols = column_indices(spectrogram.time_axis_hours(), window);

    let contrast = spectrogram
        .contrast()
        .select(Axis(0), &rows)
        .select(Axis(1), &cols);

    WindowedContrast {
        frequency: rows.iter().map(|&r| spectrogram.frequency()[r]).collect(),
        time_axis_hours: cols
            .iter()
            .map(|&c| spectrogram.time_axis_hours()[c])
            .collect(),
        contrast,
    }
}
