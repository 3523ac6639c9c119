//! Lazily loaded, process-lifetime artifacts.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use tracing::{error, info, warn};

use aqcast_core::{ForecastError, ForecastResult};
use aqcast_forecast::{LstmModel, NormalizationTransform, SequenceModel};

use crate::config::AqcastConfig;
use crate::history::HistoricalDataset;

/// Owns the model, the normalization transform and the historical dataset.
///
/// Each is loaded at most once. A failed model or transform load is cached
/// too and returned on every later call; a missing dataset degrades to an
/// empty one.
pub struct ArtifactCache {
    model_path: PathBuf,
    transform_path: PathBuf,
    dataset_path: PathBuf,
    model: OnceLock<ForecastResult<Arc<dyn SequenceModel>>>,
    transform: OnceLock<ForecastResult<Arc<NormalizationTransform>>>,
    dataset: OnceLock<Arc<HistoricalDataset>>,
}

impl core::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("model_path", &self.model_path)
            .field("transform_path", &self.transform_path)
            .field("dataset_path", &self.dataset_path)
            .field("model_loaded", &self.model.get().is_some())
            .field("transform_loaded", &self.transform.get().is_some())
            .field("dataset_loaded", &self.dataset.get().is_some())
            .finish()
    }
}

impl ArtifactCache {
    pub fn new(
        model_path: impl Into<PathBuf>,
        transform_path: impl Into<PathBuf>,
        dataset_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            transform_path: transform_path.into(),
            dataset_path: dataset_path.into(),
            model: OnceLock::new(),
            transform: OnceLock::new(),
            dataset: OnceLock::new(),
        }
    }

    pub fn from_config(cfg: &AqcastConfig) -> Self {
        Self::new(&cfg.model_path, &cfg.transform_path, &cfg.dataset_path)
    }

    /// A cache whose artifacts are already in memory.
    pub fn preloaded(
        model: Arc<dyn SequenceModel>,
        transform: Arc<NormalizationTransform>,
        dataset: HistoricalDataset,
    ) -> Self {
        let cache = Self::new("<memory>", "<memory>", "<memory>");
        let _ = cache.model.set(Ok(model));
        let _ = cache.transform.set(Ok(transform));
        let _ = cache.dataset.set(Arc::new(dataset));
        cache
    }

    pub fn model(&self) -> ForecastResult<Arc<dyn SequenceModel>> {
        self.model
            .get_or_init(|| {
                let loaded = read_artifact(&self.model_path, "model").and_then(|json| {
                    LstmModel::from_json_str(&json).map(|m| Arc::new(m) as Arc<dyn SequenceModel>)
                });
                log_load("model", &self.model_path, &loaded);
                loaded
            })
            .clone()
    }

    pub fn transform(&self) -> ForecastResult<Arc<NormalizationTransform>> {
        self.transform
            .get_or_init(|| {
                let loaded = read_artifact(&self.transform_path, "normalization")
                    .and_then(|json| NormalizationTransform::from_json_str(&json))
                    .map(Arc::new);
                log_load("normalization", &self.transform_path, &loaded);
                loaded
            })
            .clone()
    }

    pub fn dataset(&self) -> Arc<HistoricalDataset> {
        self.dataset
            .get_or_init(|| match HistoricalDataset::load(&self.dataset_path) {
                Ok(ds) => Arc::new(ds),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "historical dataset unavailable; continuing without history");
                    Arc::new(HistoricalDataset::default())
                }
            })
            .clone()
    }
}

fn read_artifact(path: &Path, what: &str) -> ForecastResult<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} artifact at {}", path.display()))
        .map_err(|err| ForecastError::ArtifactMissing(format!("{err:#}")))
}

fn log_load<T>(what: &str, path: &Path, result: &ForecastResult<T>) {
    match result {
        Ok(_) => info!(artifact = what, path = %path.display(), "artifact loaded"),
        Err(err) => error!(artifact = what, path = %path.display(), error = %err, "artifact load failed; not retrying"),
    }
}
