//! Live-data provider adapters.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use aqcast_core::{City, ForecastAverages, Pollutant, PollutionReading};

use crate::config::AqcastConfig;

/// Reasons a live fetch failed. Never surfaced past the fetcher.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("provider timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("provider reported status {0:?}")]
    Provider(String),

    #[error("malformed provider payload: {0}")]
    Payload(String),
}

/// Source of fresh readings for a city.
pub trait LiveDataProvider: Send + Sync {
    fn fetch(&self, city: &City) -> Result<PollutionReading, FetchError>;
}

impl<P> LiveDataProvider for std::sync::Arc<P>
where
    P: LiveDataProvider + ?Sized,
{
    fn fetch(&self, city: &City) -> Result<PollutionReading, FetchError> {
        (**self).fetch(city)
    }
}

/// WAQI-compatible HTTP feed client (`GET {base}/{city}/?token=...`).
#[derive(Debug, Clone)]
pub struct WaqiProvider {
    base_url: String,
    token: String,
    http: Client,
}

impl WaqiProvider {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Connection(err.to_string()))?;
        Ok(Self {
            base_url: trim_trailing_slash(base_url.into()),
            token: token.into(),
            http,
        })
    }

    pub fn from_config(cfg: &AqcastConfig) -> Result<Self, FetchError> {
        Self::new(cfg.waqi_base_url.clone(), cfg.waqi_token.clone(), cfg.fetch_timeout)
    }
}

impl LiveDataProvider for WaqiProvider {
    fn fetch(&self, city: &City) -> Result<PollutionReading, FetchError> {
        let url = format!("{}/{}/", self.base_url, city.name().trim());
        let response = self
            .http
            .get(url)
            .query(&[("token", self.token.as_str())])
            .send()
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().map_err(classify)?;
        parse_feed(city, &body)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_decode() {
        FetchError::Payload(err.to_string())
    } else {
        FetchError::Connection(err.to_string())
    }
}

fn trim_trailing_slash(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    aqi: Value,
    #[serde(default)]
    iaqi: HashMap<String, Measurement>,
    #[serde(default)]
    dominentpol: Option<String>,
    #[serde(default)]
    city: Option<FeedCity>,
    #[serde(default)]
    forecast: Option<FeedForecast>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    v: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FeedCity {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedForecast {
    #[serde(default)]
    daily: HashMap<String, Vec<DailyPoint>>,
}

#[derive(Debug, Deserialize)]
struct DailyPoint {
    avg: Option<f64>,
}

/// Turn a provider feed body into a reading.
pub fn parse_feed(city: &City, body: &str) -> Result<PollutionReading, FetchError> {
    let envelope: FeedEnvelope = serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;
    if envelope.status != "ok" {
        let detail = match envelope.data {
            Value::String(msg) => format!("{}: {msg}", envelope.status),
            _ => envelope.status,
        };
        return Err(FetchError::Provider(detail));
    }

    let data: FeedData = serde_json::from_value(envelope.data).map_err(|e| FetchError::Payload(e.to_string()))?;
    let aqi = number(&data.aqi).ok_or_else(|| FetchError::Payload(format!("no usable aqi ({})", data.aqi)))?;

    let station = data
        .city
        .and_then(|c| c.name)
        .unwrap_or_else(|| city.name().to_string());

    let value = |key: &str| data.iaqi.get(key).and_then(|m| m.v).filter(|v| v.is_finite());

    let mut reading = PollutionReading::new(aqi, station, Utc::now()).with_weather(value("t"), value("h"), value("w"));
    for p in Pollutant::ALL {
        if let Some(v) = value(p.as_str()) {
            reading = reading.with_pollutant(p, v);
        }
    }
    if let Some(p) = value("p") {
        reading = reading.with_pressure(p);
    }
    if let Some(dominant) = data.dominentpol.as_deref().and_then(Pollutant::parse) {
        reading = reading.with_dominant(dominant);
    }

    let daily = data.forecast.unwrap_or_default().daily;
    let outlook = |key: &str| daily.get(key).and_then(|points| three_day_average(points));
    Ok(reading.with_forecast(ForecastAverages {
        pm25_avg_3d: outlook("pm25"),
        pm10_avg_3d: outlook("pm10"),
        uvi_avg_3d: outlook("uvi"),
    }))
}

/// The provider reports AQI as a number, or as `"-"` when a station is offline.
fn number(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

fn three_day_average(points: &[DailyPoint]) -> Option<f64> {
    let avgs: Vec<f64> = points.iter().take(3).filter_map(|p| p.avg).collect();
    if avgs.is_empty() {
        return None;
    }
    Some(avgs.iter().sum::<f64>() / avgs.len() as f64)
}
