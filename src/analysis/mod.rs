//! Derived quantities over calibrated spectrograms: UT tick labels and the
//! frequency-drift / front-velocity model.

pub mod drift;
pub mod ticks;

pub use drift::{fit_drift, front_velocity, DriftModel, FrontVelocity};
pub use ticks::{nice_ticks, reconcile_ticks, TickLabels};
