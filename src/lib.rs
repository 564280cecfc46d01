//! Calibration, multi-file stitching and drift analysis for e-Callisto
//! radio spectrograms.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod report;

pub use error::{Result, SpectroError};
