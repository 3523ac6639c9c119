//! Pollution readings produced by the live provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pollutants tracked as sub-indices of a reading.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    So2,
    O3,
    Co,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::O3,
        Pollutant::Co,
    ];

    /// Provider / wire name of the pollutant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::O3 => "o3",
            Pollutant::Co => "co",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl core::fmt::Display for Pollutant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-range (3 day) provider forecast averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastAverages {
    pub pm25_avg_3d: Option<f64>,
    pub pm10_avg_3d: Option<f64>,
    pub uvi_avg_3d: Option<f64>,
}

/// One normalized observation from the live provider.
///
/// Created once per successful fetch and never mutated afterwards; buffers and
/// caches hold clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionReading {
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub dominant_pollutant: Option<Pollutant>,
    #[serde(default)]
    pub forecast: ForecastAverages,
    pub timestamp: DateTime<Utc>,
    pub station: String,
}

impl PollutionReading {
    /// A reading with only the overall index set.
    pub fn new(aqi: f64, station: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            aqi,
            pm25: None,
            pm10: None,
            no2: None,
            so2: None,
            o3: None,
            co: None,
            temperature: None,
            humidity: None,
            wind_speed: None,
            pressure: None,
            dominant_pollutant: None,
            forecast: ForecastAverages::default(),
            timestamp,
            station: station.into(),
        }
    }

    pub fn with_pollutant(mut self, pollutant: Pollutant, value: f64) -> Self {
        let slot = match pollutant {
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::O3 => &mut self.o3,
            Pollutant::Co => &mut self.co,
        };
        *slot = Some(value);
        self
    }

    pub fn with_weather(
        mut self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        wind_speed: Option<f64>,
    ) -> Self {
        self.temperature = temperature;
        self.humidity = humidity;
        self.wind_speed = wind_speed;
        self
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn with_dominant(mut self, pollutant: Pollutant) -> Self {
        self.dominant_pollutant = Some(pollutant);
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastAverages) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn pollutant(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::No2 => self.no2,
            Pollutant::So2 => self.so2,
            Pollutant::O3 => self.o3,
            Pollutant::Co => self.co,
        }
    }

    /// True when every pollutant sub-index is present.
    pub fn is_complete(&self) -> bool {
        Pollutant::ALL.iter().all(|p| self.pollutant(*p).is_some())
    }
}
