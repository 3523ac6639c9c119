//! Fixed-order feature vectors.
//!
//! The model was trained on exactly this column order:
//!
//! `[pm25, pm10, no2, so2, o3, co, temperature, humidity, wind_speed, violations, aqi]`
//!
//! Any deviation silently corrupts inference, so the order is declared once
//! here and every other component indexes through [`Feature`].

use serde::{Deserialize, Serialize};

use aqcast_core::PollutionReading;

use crate::transform::NormalizationTransform;

/// Number of model input features.
pub const FEATURE_COUNT: usize = 11;

/// One model input column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Pm25,
    Pm10,
    No2,
    So2,
    O3,
    Co,
    Temperature,
    Humidity,
    WindSpeed,
    Violations,
    Aqi,
}

impl Feature {
    /// Training order.
    pub const ORDER: [Feature; FEATURE_COUNT] = [
        Feature::Pm25,
        Feature::Pm10,
        Feature::No2,
        Feature::So2,
        Feature::O3,
        Feature::Co,
        Feature::Temperature,
        Feature::Humidity,
        Feature::WindSpeed,
        Feature::Violations,
        Feature::Aqi,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Pm25 => "pm25",
            Feature::Pm10 => "pm10",
            Feature::No2 => "no2",
            Feature::So2 => "so2",
            Feature::O3 => "o3",
            Feature::Co => "co",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::WindSpeed => "wind_speed",
            Feature::Violations => "violations",
            Feature::Aqi => "aqi",
        }
    }

    /// Value substituted when neither the reading nor the transform can supply one.
    ///
    /// `Violations` is an explicit zero: live readings never carry a count.
    pub fn domain_default(self) -> f64 {
        match self {
            Feature::Pm25 => 25.0,
            Feature::Pm10 => 40.0,
            Feature::No2 => 20.0,
            Feature::So2 => 5.0,
            Feature::O3 => 30.0,
            Feature::Co => 0.5,
            Feature::Temperature => 25.0,
            Feature::Humidity => 60.0,
            Feature::WindSpeed => 2.0,
            Feature::Violations => 0.0,
            Feature::Aqi => 100.0,
        }
    }

    /// Whether an artifact column name refers to this feature.
    ///
    /// Names are compared after lowercasing and dropping punctuation, so
    /// `"PM2.5"`, `"pm_25"` and `"pm25"` are the same column, and
    /// `"violations_7d"` matches `Violations`.
    pub fn matches_name(self, name: &str) -> bool {
        let key = squash(name);
        match self {
            Feature::Temperature => matches!(key.as_str(), "temperature" | "temp" | "t"),
            Feature::Humidity => matches!(key.as_str(), "humidity" | "rh" | "h"),
            Feature::WindSpeed => matches!(key.as_str(), "windspeed" | "wind" | "ws" | "w"),
            Feature::Violations => key.starts_with("violations"),
            other => key == squash(other.name()),
        }
    }
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Numeric vector in [`Feature::ORDER`]. Raw or normalized depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.0[feature.index()] = value;
        self
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        self.0
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

/// Builds raw feature vectors, imputing missing fields.
///
/// Missing values are taken from the transform's training means when the
/// artifact carries them, otherwise from [`Feature::domain_default`].
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder<'a> {
    transform: &'a NormalizationTransform,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(transform: &'a NormalizationTransform) -> Self {
        Self { transform }
    }

    pub fn impute(&self, feature: Feature) -> f64 {
        self.transform
            .mean(feature)
            .filter(|m| m.is_finite())
            .unwrap_or_else(|| feature.domain_default())
    }

    pub fn from_reading(&self, reading: &PollutionReading) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ORDER {
            let observed = match feature {
                Feature::Pm25 => reading.pm25,
                Feature::Pm10 => reading.pm10,
                Feature::No2 => reading.no2,
                Feature::So2 => reading.so2,
                Feature::O3 => reading.o3,
                Feature::Co => reading.co,
                Feature::Temperature => reading.temperature,
                Feature::Humidity => reading.humidity,
                Feature::WindSpeed => reading.wind_speed,
                Feature::Violations => None,
                Feature::Aqi => Some(reading.aqi),
            };
            values[feature.index()] = match observed {
                Some(v) if v.is_finite() => v,
                _ => self.impute(feature),
            };
        }
        FeatureVector(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqcast_core::Pollutant;
    use chrono::Utc;

    fn transform_without_means() -> NormalizationTransform {
        NormalizationTransform::new(vec![0.0; 12], vec![500.0; 12], None, None).unwrap()
    }

    #[test]
    fn order_indices_are_contiguous() {
        for (i, f) in Feature::ORDER.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
        assert_eq!(Feature::Aqi.index(), FEATURE_COUNT - 1);
    }

    #[test]
    fn name_matching_tolerates_training_spellings() {
        assert!(Feature::Pm25.matches_name("PM2.5"));
        assert!(Feature::WindSpeed.matches_name("wind_speed"));
        assert!(Feature::Violations.matches_name("violations_7d"));
        assert!(Feature::Aqi.matches_name("AQI"));
        assert!(!Feature::Aqi.matches_name("future_aqi"));
        assert!(!Feature::So2.matches_name("CO"));
    }

    #[test]
    fn missing_fields_use_domain_defaults_never_zero() {
        let t = transform_without_means();
        let builder = FeatureBuilder::new(&t);
        let reading = PollutionReading::new(120.0, "Bandra", Utc::now())
            .with_pollutant(Pollutant::Pm25, 88.0);

        let v = builder.from_reading(&reading);
        assert_eq!(v.get(Feature::Pm25), 88.0);
        assert_eq!(v.get(Feature::Pm10), 40.0);
        assert_eq!(v.get(Feature::Co), 0.5);
        assert_eq!(v.get(Feature::Humidity), 60.0);
        assert_eq!(v.get(Feature::WindSpeed), 2.0);
        assert_eq!(v.get(Feature::Aqi), 120.0);
    }

    #[test]
    fn transform_means_take_priority_over_defaults() {
        let mut means = vec![0.0; 12];
        means[Feature::Pm10.index()] = 71.5;
        means[Feature::Violations.index()] = 2.25;
        let t = NormalizationTransform::new(vec![0.0; 12], vec![500.0; 12], Some(means), None).unwrap();
        let builder = FeatureBuilder::new(&t);

        let v = builder.from_reading(&PollutionReading::new(90.0, "Worli", Utc::now()));
        assert_eq!(v.get(Feature::Pm10), 71.5);
        assert_eq!(v.get(Feature::Violations), 2.25);
    }
}
