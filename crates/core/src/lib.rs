//! `aqcast-core`
//!
//! **Responsibility:** shared building blocks for the forecasting pipeline.
//!
//! This crate contains **pure data** types: readings, the environmental context
//! derived from them, source labels and the error taxonomy. No I/O lives here.

pub mod city;
pub mod context;
pub mod error;
pub mod id;
pub mod reading;
pub mod source;

pub use city::City;
pub use context::{EnvironmentalContext, ForecastOutlook, PollutantLevels, WeatherConditions};
pub use error::{ForecastError, ForecastResult};
pub use id::RunId;
pub use reading::{ForecastAverages, Pollutant, PollutionReading};
pub use source::{FetchSource, ForecastSource};
