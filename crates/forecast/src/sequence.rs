//! Sequence assembly: live buffer, hybrid overlay, or historical rows.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aqcast_core::{City, ForecastError, ForecastResult, ForecastSource, PollutionReading};

use crate::features::{FeatureBuilder, FeatureVector};
use crate::record::HistoricalRecord;
use crate::transform::NormalizationTransform;
use crate::window::{ForecastWindow, WINDOW_SIZE};

/// How a window was sourced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    Live,
    Hybrid,
    Historical,
}

impl SequenceMode {
    pub fn source(self) -> ForecastSource {
        match self {
            SequenceMode::Live => ForecastSource::Live,
            SequenceMode::Hybrid => ForecastSource::LiveHybrid,
            SequenceMode::Historical => ForecastSource::CsvFallback,
        }
    }
}

impl core::fmt::Display for SequenceMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SequenceMode::Live => "live",
            SequenceMode::Hybrid => "hybrid",
            SequenceMode::Historical => "historical",
        })
    }
}

/// Everything the assembler may draw from for one city.
#[derive(Debug, Clone, Copy)]
pub struct SequenceInputs<'a> {
    /// Buffered readings, oldest first.
    pub buffer: &'a [PollutionReading],
    /// Reading fetched live during this request, if any.
    pub live: Option<&'a PollutionReading>,
    /// Historical rows for the city, oldest first.
    pub history: &'a [HistoricalRecord],
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSequence {
    pub window: ForecastWindow,
    pub mode: SequenceMode,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    /// Buffered readings required for live mode.
    pub min_live_readings: usize,
    /// Newest timesteps overwritten by the live reading in hybrid mode.
    pub hybrid_overlay: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            min_live_readings: 5,
            hybrid_overlay: 3,
        }
    }
}

/// Builds normalized forecast windows.
#[derive(Debug, Clone, Copy)]
pub struct SequenceAssembler<'a> {
    transform: &'a NormalizationTransform,
    config: AssemblerConfig,
}

impl<'a> SequenceAssembler<'a> {
    pub fn new(transform: &'a NormalizationTransform) -> Self {
        Self {
            transform,
            config: AssemblerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    /// Pick a sourcing mode and build the window.
    ///
    /// Priority: live buffer, hybrid overlay, historical rows. A thin buffer
    /// with no usable history still yields a (padded) live window.
    pub fn assemble(&self, city: &City, inputs: SequenceInputs<'_>) -> ForecastResult<AssembledSequence> {
        let buffered = inputs.buffer.len();

        if buffered >= self.config.min_live_readings {
            return self.from_buffer(city, inputs.buffer);
        }

        if let Some(live) = inputs.live {
            if !inputs.history.is_empty() {
                return self.hybrid(city, live, inputs.history);
            }
        }

        if inputs.history.len() >= WINDOW_SIZE {
            return self.historical(city, inputs.history);
        }

        if buffered > 0 {
            debug!(city = %city, buffered, "thin buffer without history; padding live window");
            return self.from_buffer(city, inputs.buffer);
        }

        if inputs.history.is_empty() {
            Err(ForecastError::data_unavailable(city.name()))
        } else {
            Err(ForecastError::insufficient_history(
                city.name(),
                inputs.history.len(),
                WINDOW_SIZE,
            ))
        }
    }

    fn from_buffer(&self, city: &City, buffer: &[PollutionReading]) -> ForecastResult<AssembledSequence> {
        let builder = FeatureBuilder::new(self.transform);
        let rows = buffer
            .iter()
            .map(|r| self.transform.normalize(&builder.from_reading(r)))
            .collect::<ForecastResult<Vec<_>>>()?;

        if rows.len() < WINDOW_SIZE {
            info!(city = %city, readings = rows.len(), "padding live window by repeating last reading");
        }
        let window = ForecastWindow::padded(&rows)
            .ok_or_else(|| ForecastError::data_unavailable(city.name()))?;

        Ok(AssembledSequence {
            window,
            mode: SequenceMode::Live,
        })
    }

    fn hybrid(
        &self,
        city: &City,
        live: &PollutionReading,
        history: &[HistoricalRecord],
    ) -> ForecastResult<AssembledSequence> {
        let builder = FeatureBuilder::new(self.transform);
        let mut rows = self.normalized_tail(history, WINDOW_SIZE - 1)?;
        if let Some(last) = rows.last().copied() {
            rows.resize(WINDOW_SIZE - 1, last);
        }

        let live_row = self.transform.normalize(&builder.from_reading(live))?;
        rows.push(live_row);

        let window = ForecastWindow::padded(&rows)
            .ok_or_else(|| ForecastError::data_unavailable(city.name()))?
            .with_tail(&live_row, self.config.hybrid_overlay);

        info!(
            city = %city,
            historical_rows = history.len().min(WINDOW_SIZE - 1),
            overlay = self.config.hybrid_overlay,
            "assembled hybrid window"
        );

        Ok(AssembledSequence {
            window,
            mode: SequenceMode::Hybrid,
        })
    }

    fn historical(&self, city: &City, history: &[HistoricalRecord]) -> ForecastResult<AssembledSequence> {
        let rows = self.normalized_tail(history, WINDOW_SIZE)?;
        let window = ForecastWindow::padded(&rows)
            .ok_or_else(|| ForecastError::data_unavailable(city.name()))?;

        Ok(AssembledSequence {
            window,
            mode: SequenceMode::Historical,
        })
    }

    fn normalized_tail(&self, history: &[HistoricalRecord], n: usize) -> ForecastResult<Vec<FeatureVector>> {
        let start = history.len().saturating_sub(n);
        history[start..]
            .iter()
            .map(|r| self.transform.normalize(&r.features()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_COUNT, Feature};
    use aqcast_core::Pollutant;
    use chrono::{Duration, NaiveDate, Utc};
    use proptest::prelude::*;

    fn transform() -> NormalizationTransform {
        NormalizationTransform::new(vec![0.0; 12], vec![500.0; 12], None, None).unwrap()
    }

    fn reading(aqi: f64) -> PollutionReading {
        PollutionReading::new(aqi, "Station", Utc::now()).with_pollutant(Pollutant::Pm25, aqi * 0.6)
    }

    fn history(n: usize) -> Vec<HistoricalRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| HistoricalRecord {
                city: City::new("Delhi"),
                date: start + Duration::days(i as i64),
                pm25: 100.0,
                pm10: 150.0,
                no2: 40.0,
                so2: 10.0,
                o3: 30.0,
                co: 1.0,
                temperature: 20.0,
                humidity: 60.0,
                wind_speed: 2.0,
                violations: 1.0,
                aqi: 100.0 + i as f64,
                future_aqi: 101.0 + i as f64,
            })
            .collect()
    }

    fn city() -> City {
        City::new("Delhi")
    }

    #[test]
    fn five_buffered_readings_select_live_mode() {
        let t = transform();
        let buffer: Vec<_> = (0..5).map(|i| reading(100.0 + i as f64)).collect();
        let hist = history(40);
        let seq = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &buffer, live: buffer.last(), history: &hist })
            .unwrap();

        assert_eq!(seq.mode, SequenceMode::Live);
        assert!((seq.window.last_row().get(Feature::Aqi) - 104.0 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn thin_buffer_with_live_reading_and_history_is_hybrid() {
        let t = transform();
        let buffer = vec![reading(250.0)];
        let hist = history(40);
        let seq = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &buffer, live: buffer.last(), history: &hist })
            .unwrap();

        assert_eq!(seq.mode, SequenceMode::Hybrid);
        let aqi = seq.window.aqi_column();
        // Rows 0..27 are the most recent historical rows (ending at index 38).
        assert!((aqi[26] - 137.0 / 500.0).abs() < 1e-12);
        assert!(aqi[27..].iter().all(|v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn hybrid_pads_short_history_by_repeating_last_row() {
        let t = transform();
        let buffer = vec![reading(250.0)];
        let hist = history(4);
        let seq = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &buffer, live: buffer.last(), history: &hist })
            .unwrap();

        let aqi = seq.window.aqi_column();
        assert_eq!(seq.mode, SequenceMode::Hybrid);
        assert!((aqi[0] - 100.0 / 500.0).abs() < 1e-12);
        assert!(aqi[3..27].iter().all(|v| (v - 103.0 / 500.0).abs() < 1e-12));
    }

    #[test]
    fn without_live_data_history_is_used() {
        let t = transform();
        let hist = history(45);
        let seq = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &[], live: None, history: &hist })
            .unwrap();

        assert_eq!(seq.mode, SequenceMode::Historical);
        assert_eq!(seq.mode.source(), ForecastSource::CsvFallback);
        assert!((seq.window.row(0).get(Feature::Aqi) - 115.0 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn short_history_alone_is_insufficient() {
        let t = transform();
        let hist = history(12);
        let err = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &[], live: None, history: &hist })
            .unwrap_err();

        assert_eq!(err, ForecastError::insufficient_history("Delhi", 12, 30));
    }

    #[test]
    fn nothing_at_all_is_data_unavailable() {
        let t = transform();
        let err = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &[], live: None, history: &[] })
            .unwrap_err();

        assert_eq!(err, ForecastError::data_unavailable("Delhi"));
    }

    #[test]
    fn three_readings_without_history_pad_instead_of_failing() {
        let t = transform();
        let buffer: Vec<_> = [120.0, 130.0, 140.0].into_iter().map(reading).collect();
        let seq = SequenceAssembler::new(&t)
            .assemble(&city(), SequenceInputs { buffer: &buffer, live: buffer.last(), history: &[] })
            .unwrap();

        assert_eq!(seq.mode, SequenceMode::Live);
        assert_eq!(seq.window.shape(), (1, WINDOW_SIZE, FEATURE_COUNT));
        let aqi = seq.window.aqi_column();
        assert!(aqi[2..].iter().all(|v| (v - 140.0 / 500.0).abs() < 1e-12));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: any buffer of 1..=24 readings yields a (1, 30, 11) window,
        /// with or without history and a fresh reading.
        #[test]
        fn any_buffer_yields_full_window(
            aqis in prop::collection::vec(0.0f64..500.0, 1..=24),
            history_len in 0usize..60,
            fresh in any::<bool>(),
        ) {
            let t = transform();
            let buffer: Vec<_> = aqis.into_iter().map(reading).collect();
            let hist = history(history_len);
            let live = if fresh { buffer.last() } else { None };

            let seq = SequenceAssembler::new(&t)
                .assemble(&city(), SequenceInputs { buffer: &buffer, live, history: &hist })
                .unwrap();

            prop_assert_eq!(seq.window.shape(), (1, WINDOW_SIZE, FEATURE_COUNT));
        }
    }
}
