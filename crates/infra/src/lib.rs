//! Infrastructure layer: configuration, live provider, buffers, artifacts and the request pipeline.

pub mod artifacts;
pub mod buffer;
pub mod config;
pub mod fetcher;
pub mod history;
pub mod pipeline;
pub mod provider;


pub use artifacts::ArtifactCache;
pub use buffer::{BufferManager, BufferStats};
pub use config::AqcastConfig;
pub use fetcher::{FetchOutcome, ReadingFetcher};
pub use history::HistoricalDataset;
pub use pipeline::{AnomalyReport, ContextSource, ForecastPipeline, RiskReport};
pub use provider::{FetchError, LiveDataProvider, WaqiProvider};
