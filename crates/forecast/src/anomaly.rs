use serde::{Deserialize, Serialize};
use thiserror::Error;

use aqcast_core::{Pollutant, PollutionReading};

/// A pollutant whose latest buffered value stands out from its recent baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantAnomaly {
    pub pollutant: Pollutant,
    pub value: f64,
    /// `None` when the baseline was constant.
    pub z: Option<f64>,
    pub severity: f64,
    pub explanation: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum AnomalyError {
    #[error("invalid detector input: {0}")]
    InvalidInput(String),
}

/// Rolling z-score detector over buffered pollutant series.
///
/// Model:
/// - For each pollutant, take the series of observed values (missing values skipped).
/// - Compare the most recent value against the `window` values before it.
/// - Flag if `|z|` reaches `z_threshold`.
#[derive(Debug, Clone, Copy)]
pub struct BufferAnomalyDetector {
    /// Baseline size (must be >= 2 to compute stddev).
    window: usize,
    z_threshold: f64,
}

impl Default for BufferAnomalyDetector {
    fn default() -> Self {
        Self {
            window: 10,
            z_threshold: 3.0,
        }
    }
}

impl BufferAnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_z_threshold(mut self, z_threshold: f64) -> Self {
        self.z_threshold = z_threshold;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    pub fn detect(&self, readings: &[PollutionReading]) -> Result<Vec<PollutantAnomaly>, AnomalyError> {
        if self.window < 2 {
            return Err(AnomalyError::InvalidInput(
                "window must be >= 2 to compute standard deviation".to_string(),
            ));
        }
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(AnomalyError::InvalidInput(
                "z_threshold must be a finite positive number".to_string(),
            ));
        }

        Ok(Pollutant::ALL
            .into_iter()
            .filter_map(|p| {
                let series: Vec<f64> = readings
                    .iter()
                    .filter_map(|r| r.pollutant(p))
                    .filter(|v| v.is_finite())
                    .collect();
                detect_series_anomaly(p, &series, self.window, self.z_threshold)
            })
            .collect())
    }
}

fn detect_series_anomaly(
    pollutant: Pollutant,
    series: &[f64],
    window: usize,
    z_threshold: f64,
) -> Option<PollutantAnomaly> {
    if series.len() < window + 1 {
        return None;
    }

    let (latest, earlier) = series.split_last()?;
    let baseline = &earlier[earlier.len() - window..];

    let mean = mean(baseline);
    let std = stddev_sample(baseline, mean);

    if std <= f64::EPSILON {
        if (latest - mean).abs() > 0.0 {
            return Some(PollutantAnomaly {
                pollutant,
                value: *latest,
                z: None,
                severity: 1.0,
                explanation: format!(
                    "{pollutant} is {latest:.2}; baseline is constant at {mean:.2} (std≈0)"
                ),
            });
        }
        return None;
    }

    let z = (latest - mean) / std;
    if z.abs() < z_threshold {
        return None;
    }

    Some(PollutantAnomaly {
        pollutant,
        value: *latest,
        z: Some(z),
        severity: z.abs() / z_threshold,
        explanation: format!(
            "{pollutant} is {latest:.2}; baseline mean={mean:.2}, std={std:.2}, z={z:.2} (threshold={z_threshold:.2})"
        ),
    })
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Sample standard deviation (n-1).
fn stddev_sample(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / ((xs.len() - 1) as f64);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn readings(pm25: &[f64]) -> Vec<PollutionReading> {
        pm25.iter()
            .map(|v| {
                PollutionReading::new(100.0, "Anand Vihar", Utc::now())
                    .with_pollutant(Pollutant::Pm25, *v)
                    .with_pollutant(Pollutant::No2, 40.0)
            })
            .collect()
    }

    #[test]
    fn spike_after_stable_baseline_is_flagged() {
        let mut series = vec![50.0, 52.0, 48.0, 51.0, 49.0, 50.0, 53.0, 47.0, 50.0, 50.0];
        series.push(140.0);
        let found = BufferAnomalyDetector::new().detect(&readings(&series)).unwrap();

        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert_eq!(a.pollutant, Pollutant::Pm25);
        assert_eq!(a.value, 140.0);
        assert!(a.z.unwrap() > 3.0);
        assert!(a.severity >= 1.0);
    }

    #[test]
    fn ordinary_variation_is_not_flagged() {
        let series = vec![50.0, 52.0, 48.0, 51.0, 49.0, 50.0, 53.0, 47.0, 50.0, 50.0, 52.0];
        assert!(BufferAnomalyDetector::new().detect(&readings(&series)).unwrap().is_empty());
    }

    #[test]
    fn constant_baseline_with_any_move_has_unit_severity() {
        let mut series = vec![40.0; 10];
        series.push(41.0);
        let found = BufferAnomalyDetector::new().detect(&readings(&series)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, 1.0);
        assert_eq!(found[0].z, None);
    }

    #[test]
    fn short_series_are_skipped() {
        let found = BufferAnomalyDetector::new().detect(&readings(&[10.0, 500.0])).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn degenerate_configuration_is_rejected() {
        let err = BufferAnomalyDetector::new().with_window(1).detect(&[]).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidInput(_)));

        let err = BufferAnomalyDetector::new()
            .with_z_threshold(f64::NAN)
            .detect(&[])
            .unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidInput(_)));
    }
}
