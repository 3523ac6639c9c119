//! Historical daily dataset (CSV).

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use aqcast_core::City;
use aqcast_forecast::HistoricalRecord;

/// One CSV row as written; any measurement may be blank.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "PM2.5")]
    pm25: Option<f64>,
    #[serde(rename = "PM10")]
    pm10: Option<f64>,
    #[serde(rename = "NO2")]
    no2: Option<f64>,
    #[serde(rename = "CO")]
    co: Option<f64>,
    #[serde(rename = "SO2")]
    so2: Option<f64>,
    #[serde(rename = "O3")]
    o3: Option<f64>,
    wind_speed: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    violations_7d: Option<f64>,
    #[serde(rename = "AQI")]
    aqi: Option<f64>,
    future_aqi: Option<f64>,
}

const COLUMNS: usize = 12;

impl CsvRow {
    fn values(&self) -> [Option<f64>; COLUMNS] {
        [
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.o3,
            self.co,
            self.temperature,
            self.humidity,
            self.wind_speed,
            self.violations_7d,
            self.aqi,
            self.future_aqi,
        ]
        .map(|v| v.filter(|x| x.is_finite()))
    }
}

/// Gap-filled historical rows grouped by city, each group sorted by date.
#[derive(Debug, Clone, Default)]
pub struct HistoricalDataset {
    by_city: HashMap<City, Vec<HistoricalRecord>>,
}

impl HistoricalDataset {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open historical dataset at {}", path.display()))?;
        let dataset = Self::from_reader(file)
            .with_context(|| format!("failed to parse historical dataset at {}", path.display()))?;

        info!(
            path = %path.display(),
            cities = dataset.by_city.len(),
            rows = dataset.len(),
            "historical dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader(reader: impl Read) -> anyhow::Result<Self> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let mut grouped: HashMap<City, Vec<(NaiveDate, [Option<f64>; COLUMNS])>> = HashMap::new();
        let mut skipped = 0usize;
        for (line, row) in csv.deserialize::<CsvRow>().enumerate() {
            match row {
                Ok(row) => grouped
                    .entry(City::new(row.city.trim()))
                    .or_default()
                    .push((row.date, row.values())),
                Err(err) if err.is_io_error() => {
                    return Err(err).context("failed to read historical rows");
                }
                Err(err) => {
                    skipped += 1;
                    if skipped == 1 {
                        warn!(line = line + 2, error = %err, "skipping malformed historical row");
                    }
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "malformed historical rows skipped");
        }

        let by_city = grouped
            .into_iter()
            .map(|(city, rows)| {
                let records = fill_gaps(&city, rows);
                (city, records)
            })
            .filter(|(_, records)| !records.is_empty())
            .collect();

        Ok(Self { by_city })
    }

    /// Rows for `city`, oldest first. Empty when the city is unknown.
    pub fn for_city(&self, city: &City) -> &[HistoricalRecord] {
        self.by_city.get(city).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, city: &City) -> Option<&HistoricalRecord> {
        self.for_city(city).last()
    }

    pub fn len(&self) -> usize {
        self.by_city.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_city.is_empty()
    }
}

/// Sort by date, forward-fill then back-fill each column, drop rows still incomplete.
fn fill_gaps(city: &City, mut rows: Vec<(NaiveDate, [Option<f64>; COLUMNS])>) -> Vec<HistoricalRecord> {
    rows.sort_by_key(|(date, _)| *date);

    for col in 0..COLUMNS {
        let mut last = None;
        for (_, values) in rows.iter_mut() {
            match values[col] {
                Some(v) => last = Some(v),
                None => values[col] = last,
            }
        }
        let mut next = None;
        for (_, values) in rows.iter_mut().rev() {
            match values[col] {
                Some(v) => next = Some(v),
                None => values[col] = next,
            }
        }
    }

    rows.into_iter()
        .filter_map(|(date, values)| {
            let [pm25, pm10, no2, so2, o3, co, temperature, humidity, wind_speed, violations, aqi, future_aqi] =
                values;
            Some(HistoricalRecord {
                city: city.clone(),
                date,
                pm25: pm25?,
                pm10: pm10?,
                no2: no2?,
                so2: so2?,
                o3: o3?,
                co: co?,
                temperature: temperature?,
                humidity: humidity?,
                wind_speed: wind_speed?,
                violations: violations?,
                aqi: aqi?,
                future_aqi: future_aqi?,
            })
        })
        .collect()
}
