//! Forecast reports returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aqcast_core::{City, ForecastSource, RunId};

use crate::engine::EngineOutput;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// 1-based day offset from today.
    pub day: usize,
    pub aqi: f64,
}

/// Result of one forecast request.
///
/// This is a read-only report; nothing downstream mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub run_id: RunId,
    pub city: City,
    pub days: Vec<DailyForecast>,
    pub data_source: ForecastSource,
    /// True when live readings shaped the window.
    pub live_backed: bool,
    /// Fresh live AQI used for anchoring, if any.
    pub current_aqi: Option<f64>,
    pub correction_factor: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

impl ForecastReport {
    pub fn new(city: City, data_source: ForecastSource, output: EngineOutput) -> Self {
        let days = output
            .days
            .into_iter()
            .enumerate()
            .map(|(i, aqi)| DailyForecast { day: i + 1, aqi })
            .collect();

        Self {
            run_id: RunId::new(),
            city,
            days,
            data_source,
            live_backed: data_source.is_live_backed(),
            current_aqi: None,
            correction_factor: output.correction_factor,
            generated_at: Utc::now(),
        }
    }

    pub fn with_current_aqi(mut self, aqi: Option<f64>) -> Self {
        self.current_aqi = aqi;
        self
    }

    pub fn is_live_backed(&self) -> bool {
        self.live_backed
    }

    /// Forecast AQI values, day 1 first.
    pub fn values(&self) -> Vec<f64> {
        self.days.iter().map(|d| d.aqi).collect()
    }
}
