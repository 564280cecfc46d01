use chrono::{Duration, NaiveTime};

use crate::data::stitch::round_to;
use crate::error::{Result, SpectroError};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Tick positions on a UT axis (hours) with their `HH:MM` labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TickLabels {
    pub positions: Vec<f64>,
    pub labels: Vec<String>,
}

/// Format minutes-of-day as zero-padded `HH:MM`, wrapping at midnight.
pub fn format_minutes(minutes: i64) -> String {
    clock_at(minutes).format("%H:%M").to_string()
}

fn clock_at(minutes: i64) -> NaiveTime {
    NaiveTime::default() + Duration::minutes(minutes.rem_euclid(MINUTES_PER_DAY))
}

/// Minutes-of-day of a tick position. The position is taken to the nearest
/// second and the seconds are then dropped, so a fractional minute never
/// rounds up.
pub fn tick_minutes(hours: f64) -> i64 {
    ((hours * 3600.0).round() as i64).div_euclid(60)
}

/// `HH:MM` label of a raw tick position.
pub fn tick_label(hours: f64) -> String {
    format_minutes(tick_minutes(hours))
}

/// Minutes-of-day of a data boundary: the UT is rounded to two decimals of
/// an hour, converted to whole seconds and truncated to the minute.
pub fn boundary_minutes(hours: f64) -> i64 {
    let seconds = (round_to(hours, 2) * 3600.0).round() as i64;
    seconds.div_euclid(60)
}

/// Turn candidate tick positions over a (possibly stitched) time axis into
/// evenly spaced labels that agree with the data boundaries.
///
/// A candidate at either end whose label differs from the corresponding
/// boundary overshoots the data and is dropped. The surviving ticks are then
/// relabelled from the first survivor's minute at a whole-minute interval of
/// `round((last - first) / (n - 1))` (ties to even), so the labels never
/// accumulate the float error of the individual candidate positions. With
/// nothing dropped the first and last survivors sit on the data boundaries.
pub fn reconcile_ticks(time_axis_hours: &[f64], candidates: &[f64]) -> Result<TickLabels> {
    let (Some(&first), Some(&last)) = (time_axis_hours.first(), time_axis_hours.last()) else {
        return Err(SpectroError::InsufficientData {
            what: "tick reconciliation time axis",
            needed: 1,
            got: 0,
        });
    };

    let initial = boundary_minutes(first);
    let final_ = boundary_minutes(last);
    let mut positions = candidates.to_vec();

    if let Some(&head) = positions.first() {
        if tick_minutes(head) != initial {
            log::debug!(
                "Dropping first tick {} (data starts {})",
                tick_label(head),
                format_minutes(initial)
            );
            positions.remove(0);
        }
    }
    if let Some(&tail) = positions.last() {
        if tick_minutes(tail) != final_ {
            log::debug!(
                "Dropping last tick {} (data ends {})",
                tick_label(tail),
                format_minutes(final_)
            );
            positions.pop();
        }
    }

    let n = positions.len();
    if n < 2 {
        return Err(SpectroError::InsufficientData {
            what: "tick labels",
            needed: 2,
            got: n,
        });
    }

    let anchor = tick_minutes(positions[0]);
    let span = tick_minutes(positions[n - 1]) - anchor;
    let interval = (span as f64 / (n - 1) as f64).round_ties_even() as i32;
    let start = clock_at(anchor);
    let step = Duration::minutes(interval.into());
    let labels = (0..n as i32)
        .map(|k| (start + step * k).format("%H:%M").to_string())
        .collect();

    Ok(TickLabels { positions, labels })
}

/// "Nice" candidate tick positions covering `[start, end]`.
///
/// The step is the smallest of 1, 2, 2.5 or 5 times a power of ten that
/// keeps the count near `max_ticks`; the outermost ticks are the multiples
/// of the step at or beyond the range, so they may overshoot it.
pub fn nice_ticks(start: f64, end: f64, max_ticks: usize) -> Vec<f64> {
    let (lo, hi) = (start.min(end), start.max(end));
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        return vec![lo];
    }

    let raw_step = span / max_ticks.saturating_sub(1).max(1) as f64;
    let exponent = raw_step.log10().floor() as i32;
    // Divide for negative exponents so steps equal their decimal literals.
    let scaled = |m: f64| {
        if exponent >= 0 {
            m * 10f64.powi(exponent)
        } else {
            m / 10f64.powi(-exponent)
        }
    };
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .into_iter()
        .map(scaled)
        .find(|&s| s >= raw_step)
        .unwrap_or_else(|| scaled(10.0));

    let first = (lo / step).floor() as i64;
    let last = (hi / step).ceil() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}
