//! Environmental context shared by the forecast anchoring step and the risk scorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::{Pollutant, PollutionReading};

/// Pollutant sub-indices plus the provider's dominant pollutant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantLevels {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub dominant: Option<Pollutant>,
}

/// Weather fields observed alongside a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// 3-day forecast averages (provider-side, not the LSTM forecast).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutlook {
    pub pm25_avg_3d: Option<f64>,
    pub pm10_avg_3d: Option<f64>,
    pub uvi_avg_3d: Option<f64>,
}

/// Read-only view of the environment around one city at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalContext {
    pub aqi: f64,
    pub pollutants: PollutantLevels,
    pub weather: WeatherConditions,
    pub forecast: ForecastOutlook,
    pub timestamp: Option<DateTime<Utc>>,
    pub station: Option<String>,
}

impl EnvironmentalContext {
    pub fn from_reading(reading: &PollutionReading) -> Self {
        Self {
            aqi: reading.aqi,
            pollutants: PollutantLevels {
                pm25: reading.pm25,
                pm10: reading.pm10,
                no2: reading.no2,
                so2: reading.so2,
                o3: reading.o3,
                co: reading.co,
                dominant: reading.dominant_pollutant,
            },
            weather: WeatherConditions {
                temperature: reading.temperature,
                humidity: reading.humidity,
                pressure: reading.pressure,
                wind_speed: reading.wind_speed,
            },
            forecast: ForecastOutlook {
                pm25_avg_3d: reading.forecast.pm25_avg_3d,
                pm10_avg_3d: reading.forecast.pm10_avg_3d,
                uvi_avg_3d: reading.forecast.uvi_avg_3d,
            },
            timestamp: Some(reading.timestamp),
            station: Some(reading.station.clone()),
        }
    }
}

impl From<&PollutionReading> for EnvironmentalContext {
    fn from(reading: &PollutionReading) -> Self {
        Self::from_reading(reading)
    }
}
