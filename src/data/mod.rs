/// Data layer: container loading, calibration, stitching and windowing.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawObservation → SpectrogramDataset
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ calibrate  │  digits → dB, row median, contrast
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  stitch   │  N calibrated datasets → one time axis
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  time / frequency window → contrast cut
///   └──────────┘
/// ```

pub mod calibrate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod stitch;

pub use calibrate::{calibrate, CalibratedDataset};
pub use loader::{load_observation, open_dataset};
pub use model::{RawObservation, Spectrogram, SpectrogramDataset};
pub use stitch::{stitch, StitchedDataset};
