use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Axis labels per language
// ---------------------------------------------------------------------------

/// Languages with a translated label set. Unknown codes fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    Portuguese,
}

/// The three text labels that accompany a spectrogram figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisLabels {
    pub colorbar: &'static str,
    pub xlabel: &'static str,
    pub ylabel: &'static str,
}

const ENGLISH: AxisLabels = AxisLabels {
    colorbar: "dB above background",
    xlabel: "Time (UT)",
    ylabel: "Frequency (MHz)",
};

const PORTUGUESE: AxisLabels = AxisLabels {
    colorbar: "dB acima da frequência de fundo",
    xlabel: "Tempo (UT)",
    ylabel: "Frequência (MHz)",
};

impl Language {
    /// Case-insensitive lookup of a language code such as `"en"` or `"PT"`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "pt" => Language::Portuguese,
            "en" => Language::English,
            other => {
                log::debug!("Unknown language code '{other}', using English labels");
                Language::English
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Portuguese => "pt",
        }
    }

    pub fn labels(self) -> AxisLabels {
        match self {
            Language::English => ENGLISH,
            Language::Portuguese => PORTUGUESE,
        }
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Language::from_code(&code)
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// Processing / presentation settings
// ---------------------------------------------------------------------------

/// Settings shared by every command, independent of any rendering backend.
///
/// Every field has a default so a settings file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Label language.
    pub language: Language,

    /// Lower bound of the contrast colour normalisation (dB).
    pub v_min: f64,

    /// Upper bound of the contrast colour normalisation (dB).
    pub v_max: f64,

    /// Upper limit on the number of candidate time ticks.
    pub max_ticks: usize,

    /// Optional `[start, end]` UT window in hours.
    pub time_range: Option<(f64, f64)>,

    /// Optional `[low, high]` frequency window in MHz.
    pub frequency_range: Option<(f64, f64)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::English,
            v_min: -1.0,
            v_max: 8.0,
            max_ticks: 8,
            time_range: None,
            frequency_range: None,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        log::debug!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    pub fn labels(&self) -> AxisLabels {
        self.language.labels()
    }
}
