use std::fmt;

use serde::Serialize;

use crate::data::model::{freq_axis_samples, Spectrogram, FREQ_AXIS_SAMPLES};
use crate::data::stitch::round_to;
use crate::error::{Result, SpectroError};

/// Plasma frequency coefficient: `f [MHz] = 8.98e-3 * sqrt(N [cm^-3])`.
pub const PLASMA_FREQUENCY_COEFF: f64 = 8.98e-3;
/// Reference electron density of the hydrostatic atmosphere (cm^-3).
pub const REFERENCE_DENSITY: f64 = 4.6e8;
/// Density scale height (km).
pub const SCALE_HEIGHT_KM: f64 = 7e4;

/// Linear frequency drift `f(t) = slope * t + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriftModel {
    /// MHz per unit of the fitted time axis (MHz/h on a UT axis).
    pub slope: f64,
    /// MHz.
    pub intercept: f64,
}

impl DriftModel {
    pub fn frequency_at(&self, time: f64) -> f64 {
        self.slope * time + self.intercept
    }

    /// Fit the drift of a calibrated or stitched spectrogram.
    ///
    /// Each source segment contributes its UT axis paired with a
    /// [`FREQ_AXIS_SAMPLES`]-point resampling of the band, so every segment
    /// must be exactly that many columns long.
    pub fn from_spectrogram<S: Spectrogram + ?Sized>(spectrogram: &S) -> Result<Self> {
        let freq_samples = freq_axis_samples(spectrogram.frequency());
        let axis = spectrogram.time_axis_hours();

        let mut times = Vec::with_capacity(axis.len());
        let mut freqs = Vec::with_capacity(axis.len());
        for (i, segment) in spectrogram.segments().into_iter().enumerate() {
            if segment.len() != FREQ_AXIS_SAMPLES {
                return Err(SpectroError::format(format!(
                    "segment {i} has {} columns; drift samples need {FREQ_AXIS_SAMPLES}",
                    segment.len()
                )));
            }
            times.extend_from_slice(&axis[segment]);
            freqs.extend_from_slice(&freq_samples);
        }
        fit_drift(&times, &freqs)
    }
}

impl fmt::Display for DriftModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f(t) = {:.2} + ({:.2}t)", self.intercept, self.slope)
    }
}

/// Ordinary least-squares line through `(time, freq)` pairs.
pub fn fit_drift(time: &[f64], freq: &[f64]) -> Result<DriftModel> {
    if time.len() != freq.len() {
        return Err(SpectroError::format(format!(
            "{} time samples but {} frequency samples",
            time.len(),
            freq.len()
        )));
    }

    let distinct = count_distinct(time);
    if distinct < 2 {
        return Err(SpectroError::InsufficientData {
            what: "drift fit",
            needed: 2,
            got: distinct,
        });
    }

    let n = time.len() as f64;
    let mean_t = time.iter().sum::<f64>() / n;
    let mean_f = freq.iter().sum::<f64>() / n;
    let (sxy, sxx) = time
        .iter()
        .zip(freq)
        .fold((0.0, 0.0), |(sxy, sxx), (&t, &f)| {
            let dt = t - mean_t;
            (sxy + dt * (f - mean_f), sxx + dt * dt)
        });

    let slope = sxy / sxx;
    let model = DriftModel {
        slope,
        intercept: mean_f - slope * mean_t,
    };
    log::debug!("Fitted drift {model} over {} samples", time.len());
    Ok(model)
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Electron density (cm^-3) at which `freq_mhz` is the plasma frequency.
pub fn electron_density(freq_mhz: f64) -> f64 {
    (freq_mhz / PLASMA_FREQUENCY_COEFF).powi(2)
}

/// Height (km) of a density in the hydrostatic model.
pub fn density_height(density: f64) -> f64 {
    (REFERENCE_DENSITY / density).ln() * SCALE_HEIGHT_KM
}

// ---------------------------------------------------------------------------
// Front velocity
// ---------------------------------------------------------------------------

/// Propagation of a density front between two fiducial times.
///
/// The derived fields are `None` when the velocity was supplied directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontVelocity {
    /// |f(sup) - f(inf)| in MHz.
    pub freq_diff: Option<f64>,
    /// |N(sup) - N(inf)| in cm^-3.
    pub density_diff: Option<f64>,
    /// H(sup) - H(inf) in km.
    pub height_diff: Option<f64>,
    /// Elapsed seconds.
    pub time_diff: Option<f64>,
    /// Mean drift rate in MHz/s.
    pub df_over_dt: Option<f64>,
    /// km/s, one decimal.
    pub velocity: f64,
}

impl FrontVelocity {
    /// Wrap a velocity obtained elsewhere.
    pub fn from_velocity(velocity: f64) -> Self {
        FrontVelocity {
            freq_diff: None,
            density_diff: None,
            height_diff: None,
            time_diff: None,
            df_over_dt: None,
            velocity,
        }
    }
}

/// Front velocity between `inf_time` and `sup_time` (hours on the model's
/// time axis).
pub fn front_velocity(model: &DriftModel, inf_time: f64, sup_time: f64) -> Result<FrontVelocity> {
    if inf_time == sup_time {
        return Err(SpectroError::DegenerateInterval { time: inf_time });
    }

    let inf_freq = model.frequency_at(inf_time);
    let sup_freq = model.frequency_at(sup_time);
    let inf_density = electron_density(inf_freq);
    let sup_density = electron_density(sup_freq);

    let freq_diff = (sup_freq - inf_freq).abs();
    let height_diff = density_height(sup_density) - density_height(inf_density);
    let time_diff = (sup_time - inf_time) * 3600.0;

    Ok(FrontVelocity {
        freq_diff: Some(freq_diff),
        density_diff: Some((sup_density - inf_density).abs()),
        height_diff: Some(height_diff),
        time_diff: Some(time_diff),
        df_over_dt: Some(freq_diff / time_diff),
        velocity: round_to(height_diff / time_diff, 1),
    })
}
