//! Data-source labels.

use serde::{Deserialize, Serialize};

/// Outcome label of a single live fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Fresh reading from the provider.
    Live,
    /// Provider failed; last known good reading was returned.
    Fallback,
    /// Provider failed and nothing was cached.
    Error,
}

/// Which data backed a forecast window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    Live,
    LiveHybrid,
    CsvFallback,
}

impl ForecastSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastSource::Live => "live",
            ForecastSource::LiveHybrid => "live_hybrid",
            ForecastSource::CsvFallback => "csv_fallback",
        }
    }

    /// Whether any live measurement went into the window.
    pub fn is_live_backed(&self) -> bool {
        !matches!(self, ForecastSource::CsvFallback)
    }
}

impl core::fmt::Display for ForecastSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
