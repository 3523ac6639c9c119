//! Min-max normalization fitted at training time.
//!
//! The artifact carries statistics for the 11 model features and, usually, a
//! 12th target column (`future_aqi`). The feature-order contract is checked
//! once when the artifact is loaded; at request time columns are addressed
//! purely by index.

use serde::{Deserialize, Serialize};
use tracing::debug;

use aqcast_core::{ForecastError, ForecastResult};

use crate::features::{FEATURE_COUNT, Feature, FeatureVector};

/// Width of a transform that also covers the target column.
pub const WIDTH_WITH_TARGET: usize = FEATURE_COUNT + 1;

/// Serialized form of the normalization artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformArtifact {
    #[serde(alias = "data_min_")]
    pub data_min: Vec<f64>,
    #[serde(alias = "data_max_")]
    pub data_max: Vec<f64>,
    #[serde(default)]
    pub mean: Option<Vec<f64>>,
    #[serde(default, alias = "feature_names_in_")]
    pub feature_names: Option<Vec<String>>,
}

/// Validated, immutable normalization statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationTransform {
    min: Vec<f64>,
    max: Vec<f64>,
    mean: Option<Vec<f64>>,
    names: Option<Vec<String>>,
}

impl NormalizationTransform {
    pub fn new(
        min: Vec<f64>,
        max: Vec<f64>,
        mean: Option<Vec<f64>>,
        names: Option<Vec<String>>,
    ) -> ForecastResult<Self> {
        let width = min.len();
        if width != FEATURE_COUNT && width != WIDTH_WITH_TARGET {
            return Err(ForecastError::TransformMismatch {
                expected: WIDTH_WITH_TARGET,
                actual: width,
            });
        }
        if max.len() != width {
            return Err(ForecastError::ArtifactInvalid(format!(
                "transform has {width} minimums but {} maximums",
                max.len()
            )));
        }
        for (col, (lo, hi)) in min.iter().zip(&max).enumerate() {
            if !(lo.is_finite() && hi.is_finite()) || hi < lo {
                return Err(ForecastError::ArtifactInvalid(format!(
                    "transform column {col} has invalid range [{lo}, {hi}]"
                )));
            }
        }
        if let Some(m) = &mean {
            if m.len() != width {
                return Err(ForecastError::ArtifactInvalid(format!(
                    "transform has {width} columns but {} means",
                    m.len()
                )));
            }
        }
        if let Some(n) = &names {
            validate_names(n, width)?;
        }

        Ok(Self { min, max, mean, names })
    }

    pub fn from_artifact(artifact: TransformArtifact) -> ForecastResult<Self> {
        Self::new(
            artifact.data_min,
            artifact.data_max,
            artifact.mean,
            artifact.feature_names,
        )
    }

    pub fn from_json_str(json: &str) -> ForecastResult<Self> {
        let artifact: TransformArtifact = serde_json::from_str(json)
            .map_err(|e| ForecastError::ArtifactInvalid(format!("normalization artifact: {e}")))?;
        Self::from_artifact(artifact)
    }

    pub fn width(&self) -> usize {
        self.min.len()
    }

    pub fn has_target(&self) -> bool {
        self.width() == WIDTH_WITH_TARGET
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Training mean of a feature, when the artifact recorded one.
    pub fn mean(&self, feature: Feature) -> Option<f64> {
        self.mean.as_ref().map(|m| m[feature.index()])
    }

    fn range(&self, column: usize) -> f64 {
        let range = self.max[column] - self.min[column];
        // Constant columns scale by 1, as the fitting library does.
        if range == 0.0 { 1.0 } else { range }
    }

    pub fn normalize_value(&self, column: usize, value: f64) -> f64 {
        (value - self.min[column]) / self.range(column)
    }

    pub fn inverse_value(&self, column: usize, value: f64) -> f64 {
        value * self.range(column) + self.min[column]
    }

    /// Normalize one row.
    ///
    /// Rows must be as wide as the transform. A row exactly one column short
    /// (the target column) is zero-padded, transformed and truncated back.
    pub fn normalize_row(&self, row: &[f64]) -> ForecastResult<Vec<f64>> {
        self.check_row(row)?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(col, v)| self.normalize_value(col, *v))
            .collect())
    }

    pub fn inverse_row(&self, row: &[f64]) -> ForecastResult<Vec<f64>> {
        self.check_row(row)?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(col, v)| self.inverse_value(col, *v))
            .collect())
    }

    fn check_row(&self, row: &[f64]) -> ForecastResult<()> {
        let width = self.width();
        if row.len() == width {
            return Ok(());
        }
        if row.len() + 1 == width {
            debug!(width, row = row.len(), "zero-padding row for target column");
            return Ok(());
        }
        Err(ForecastError::TransformMismatch {
            expected: width,
            actual: row.len(),
        })
    }

    pub fn normalize(&self, vector: &FeatureVector) -> ForecastResult<FeatureVector> {
        let row = self.normalize_row(vector.as_slice())?;
        Ok(to_vector(&row))
    }

    pub fn inverse(&self, vector: &FeatureVector) -> ForecastResult<FeatureVector> {
        let row = self.inverse_row(vector.as_slice())?;
        Ok(to_vector(&row))
    }

    /// Column used to map model outputs back to AQI.
    pub fn target_column(&self) -> usize {
        if self.has_target() {
            FEATURE_COUNT
        } else {
            Feature::Aqi.index()
        }
    }

    /// Real AQI for a normalized model output.
    pub fn inverse_target(&self, scaled: f64) -> f64 {
        self.inverse_value(self.target_column(), scaled)
    }

    /// Normalized AQI feature value for a real AQI.
    pub fn normalize_aqi(&self, aqi: f64) -> f64 {
        self.normalize_value(Feature::Aqi.index(), aqi)
    }
}

fn to_vector(row: &[f64]) -> FeatureVector {
    let mut values = [0.0; FEATURE_COUNT];
    values.copy_from_slice(&row[..FEATURE_COUNT]);
    FeatureVector::new(values)
}

fn validate_names(names: &[String], width: usize) -> ForecastResult<()> {
    if names.len() != width {
        return Err(ForecastError::TransformMismatch {
            expected: width,
            actual: names.len(),
        });
    }
    for (feature, name) in Feature::ORDER.iter().zip(names) {
        if !feature.matches_name(name) {
            return Err(ForecastError::ArtifactInvalid(format!(
                "transform column {} is '{name}', expected {feature}",
                feature.index()
            )));
        }
    }
    Ok(())
}
