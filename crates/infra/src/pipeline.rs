//! Request-level orchestration: fetch, assemble, forecast, score.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use aqcast_core::{City, EnvironmentalContext, FetchSource, ForecastError, ForecastResult};
use aqcast_forecast::{
    AssemblerConfig, BufferAnomalyDetector, EngineConfig, ForecastEngine, ForecastReport, ForecastStage,
    PollutantAnomaly, SequenceAssembler, SequenceInputs,
};
use aqcast_risk::{CompositeRiskScorer, RiskAssessment};

use crate::artifacts::ArtifactCache;
use crate::buffer::{BufferManager, BufferStats};
use crate::config::AqcastConfig;
use crate::fetcher::ReadingFetcher;
use crate::provider::{FetchError, LiveDataProvider, WaqiProvider};

/// Where a risk context came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Live,
    Fallback,
    CsvFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub city: City,
    pub data_source: ContextSource,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub city: City,
    pub readings: usize,
    pub anomalies: Vec<PollutantAnomaly>,
}

/// Single entry point for forecasts, risk assessments and buffer checks.
#[derive(Debug)]
pub struct ForecastPipeline {
    fetcher: ReadingFetcher,
    artifacts: Arc<ArtifactCache>,
    engine_config: EngineConfig,
    assembler_config: AssemblerConfig,
    scorer: CompositeRiskScorer,
    detector: BufferAnomalyDetector,
}

impl ForecastPipeline {
    pub fn new(provider: Arc<dyn LiveDataProvider>, artifacts: Arc<ArtifactCache>, buffers: Arc<BufferManager>) -> Self {
        Self {
            fetcher: ReadingFetcher::new(provider, buffers),
            artifacts,
            engine_config: EngineConfig::default(),
            assembler_config: AssemblerConfig::default(),
            scorer: CompositeRiskScorer::new(),
            detector: BufferAnomalyDetector::new(),
        }
    }

    /// WAQI provider, on-disk artifacts and buffers sized from `cfg`.
    pub fn from_config(cfg: &AqcastConfig) -> Result<Self, FetchError> {
        let provider = WaqiProvider::from_config(cfg)?;
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(ArtifactCache::from_config(cfg)),
            Arc::new(BufferManager::new(cfg.buffer_capacity)),
        ))
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn with_assembler_config(mut self, config: AssemblerConfig) -> Self {
        self.assembler_config = config;
        self
    }

    pub fn with_scorer(mut self, scorer: CompositeRiskScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_detector(mut self, detector: BufferAnomalyDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn buffers(&self) -> &Arc<BufferManager> {
        self.fetcher.buffers()
    }

    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }

    /// Bounded multi-day AQI forecast for `city`.
    #[instrument(skip(self, city), fields(city = %city))]
    pub fn forecast(&self, city: &City) -> ForecastResult<ForecastReport> {
        let result = self.run_forecast(city);
        if let Err(err) = &result {
            error!(stage = %ForecastStage::Error, error = %err, "forecast failed");
        }
        result
    }

    fn run_forecast(&self, city: &City) -> ForecastResult<ForecastReport> {
        debug!(stage = %ForecastStage::FetchLive);
        let outcome = self.fetcher.fetch(city);
        let fresh = outcome.fresh();

        let transform = self.artifacts.transform()?;
        let model = self.artifacts.model()?;
        let dataset = self.artifacts.dataset();
        let buffer = self.buffers().get(city);

        let assembled = SequenceAssembler::new(&transform)
            .with_config(self.assembler_config)
            .assemble(
                city,
                SequenceInputs {
                    buffer: &buffer,
                    live: fresh,
                    history: dataset.for_city(city),
                },
            )?;
        let stage = ForecastStage::BuildSequence(assembled.mode);
        debug!(stage = %stage);

        let live_aqi = fresh.map(|r| r.aqi);
        let output = ForecastEngine::new(model, transform.clone())
            .with_config(self.engine_config)
            .run(assembled.window, live_aqi)?;

        let source = assembled.mode.source();
        let report = ForecastReport::new(city.clone(), source, output).with_current_aqi(live_aqi);

        debug!(stage = %ForecastStage::Respond);
        info!(
            run_id = %report.run_id,
            source = %source,
            forecast = ?report.values(),
            fetch = ?outcome.source,
            "forecast complete"
        );
        Ok(report)
    }

    /// Composite risk for `city`, from the live reading, the cached one, or the latest historical row.
    #[instrument(skip(self, city), fields(city = %city))]
    pub fn assess_risk(&self, city: &City) -> ForecastResult<RiskReport> {
        let outcome = self.fetcher.fetch(city);

        let (context, data_source) = match (&outcome.reading, outcome.source) {
            (Some(reading), FetchSource::Live) => (EnvironmentalContext::from_reading(reading), ContextSource::Live),
            (Some(reading), _) => (EnvironmentalContext::from_reading(reading), ContextSource::Fallback),
            (None, _) => {
                let dataset = self.artifacts.dataset();
                let latest = dataset
                    .latest(city)
                    .ok_or_else(|| ForecastError::data_unavailable(city.name()))?;
                (latest.to_context(), ContextSource::CsvFallback)
            }
        };

        let assessment = RiskAssessment::evaluate(&self.scorer, context);
        info!(
            source = ?data_source,
            score = assessment.risk.score,
            category = %assessment.risk.category,
            "risk assessed"
        );

        Ok(RiskReport {
            city: city.clone(),
            data_source,
            assessment,
        })
    }

    /// Fetch (to refresh the buffer) and flag pollutants that jumped against their recent baseline.
    #[instrument(skip(self, city), fields(city = %city))]
    pub fn detect_anomalies(&self, city: &City) -> ForecastResult<AnomalyReport> {
        self.fetcher.fetch(city);
        let buffer = self.buffers().get(city);
        if buffer.is_empty() {
            return Err(ForecastError::data_unavailable(city.name()));
        }

        let anomalies = self
            .detector
            .detect(&buffer)
            .map_err(|e| ForecastError::inference(e.to_string()))?;
        if !anomalies.is_empty() {
            info!(count = anomalies.len(), "buffer anomalies detected");
        }

        Ok(AnomalyReport {
            city: city.clone(),
            readings: buffer.len(),
            anomalies,
        })
    }

    pub fn buffer_stats(&self, city: &City) -> BufferStats {
        self.buffers().stats(city)
    }
}
