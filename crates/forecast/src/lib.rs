//! `aqcast-forecast`
//!
//! **Responsibility:** turn readings and historical rows into a bounded
//! multi-day AQI forecast.
//!
//! This crate performs no I/O:
//! - Artifacts arrive as already-read JSON strings.
//! - Readings and historical rows are handed in by the caller.
//! - Models are reached through the [`SequenceModel`] trait, so tests can stub them.

pub mod anomaly;
pub mod engine;
pub mod features;
pub mod model;
pub mod record;
pub mod result;
pub mod sequence;
pub mod transform;
pub mod window;

pub use anomaly::{AnomalyError, BufferAnomalyDetector, PollutantAnomaly};
pub use engine::{EngineConfig, EngineOutput, ForecastEngine, ForecastStage};
pub use features::{FEATURE_COUNT, Feature, FeatureBuilder, FeatureVector};
pub use model::{LstmArtifact, LstmModel, SequenceModel};
pub use record::HistoricalRecord;
pub use result::{DailyForecast, ForecastReport};
pub use sequence::{AssembledSequence, AssemblerConfig, SequenceAssembler, SequenceInputs, SequenceMode};
pub use transform::{NormalizationTransform, TransformArtifact};
pub use window::{ForecastWindow, WINDOW_SIZE};
