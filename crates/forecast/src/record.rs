//! Historical daily records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use aqcast_core::{City, EnvironmentalContext, PollutantLevels, WeatherConditions};

use crate::features::FeatureVector;

/// One complete historical row for one city and one day.
///
/// Rows reach this type only after gap filling, so every field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub city: City,
    pub date: NaiveDate,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub co: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub violations: f64,
    pub aqi: f64,
    /// Next-day AQI the model was trained against.
    pub future_aqi: f64,
}

impl HistoricalRecord {
    pub fn features(&self) -> FeatureVector {
        FeatureVector::new([
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.o3,
            self.co,
            self.temperature,
            self.humidity,
            self.wind_speed,
            self.violations,
            self.aqi,
        ])
    }

    /// Context used when no live reading is available.
    pub fn to_context(&self) -> EnvironmentalContext {
        EnvironmentalContext {
            aqi: self.aqi,
            pollutants: PollutantLevels {
                pm25: Some(self.pm25),
                pm10: Some(self.pm10),
                no2: Some(self.no2),
                so2: Some(self.so2),
                o3: Some(self.o3),
                co: Some(self.co),
                dominant: None,
            },
            weather: WeatherConditions {
                temperature: Some(self.temperature),
                humidity: Some(self.humidity),
                pressure: None,
                wind_speed: Some(self.wind_speed),
            },
            forecast: Default::default(),
            timestamp: self.date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            station: None,
        }
    }
}
