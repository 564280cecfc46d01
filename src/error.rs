use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, SpectroError>;

/// Everything that can go wrong between opening a container and computing a
/// front velocity. All failures are local and synchronous.
#[derive(Error, Debug)]
pub enum SpectroError {
    /// The observation container does not exist.
    #[error("observation file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Malformed or inconsistent input shapes or header fields.
    #[error("format error: {0}")]
    Format(String),

    /// Stitching inputs that do not share the same frequency table.
    #[error("dataset {index} has an incompatible frequency band: {reason}")]
    IncompatibleBand { index: usize, reason: String },

    /// Stitching was asked to combine zero datasets.
    #[error("no datasets to stitch")]
    EmptyInput,

    /// Too few samples for a fit or too few ticks to label.
    #[error("insufficient data for {what}: need at least {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    /// Front velocity requested over a zero-length interval.
    #[error("degenerate interval: inferior and superior front times are both {time} h")]
    DegenerateInterval { time: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl SpectroError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        SpectroError::Format(message.into())
    }
}
