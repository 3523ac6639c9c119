use serde::{Deserialize, Serialize};
use tracing::info;

use aqcast_core::{EnvironmentalContext, ForecastOutlook, PollutantLevels, WeatherConditions};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskCategory {
    /// Band for a composite score in `[0, 100]`.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            RiskCategory::Low
        } else if score < 50.0 {
            RiskCategory::Moderate
        } else if score < 75.0 {
            RiskCategory::High
        } else {
            RiskCategory::Critical
        }
    }

    /// Action priority, 1 being most urgent.
    pub fn priority(self) -> u8 {
        match self {
            RiskCategory::Critical => 1,
            RiskCategory::High => 2,
            RiskCategory::Moderate => 3,
            RiskCategory::Low => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Moderate => "Moderate",
            RiskCategory::High => "High",
            RiskCategory::Critical => "Critical",
        }
    }
}

impl core::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub pollution: f64,
    pub stagnation: f64,
    pub forecast_trend: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Composite truncated to an integer.
    pub score: u8,
    pub composite: f64,
    pub category: RiskCategory,
    /// Likelihood in `[0, 1]` that conditions worsen over the next days.
    pub escalation_probability: f64,
    pub components: RiskComponents,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
    pub pollution: f64,
    pub stagnation: f64,
    pub forecast_trend: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            pollution: 0.50,
            stagnation: 0.25,
            forecast_trend: 0.25,
        }
    }
}

/// Weighted pollution / stagnation / trend scorer. Pure and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeRiskScorer {
    weights: RiskWeights,
}

impl CompositeRiskScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn score(&self, ctx: &EnvironmentalContext) -> RiskScore {
        let pollution = pollution_score(ctx.aqi, &ctx.pollutants);
        let stagnation = stagnation_score(&ctx.weather);
        let (forecast_trend, escalation_probability) = forecast_trend(ctx.pollutants.pm25, &ctx.forecast);

        let w = &self.weights;
        let composite = (w.pollution * pollution + w.stagnation * stagnation + w.forecast_trend * forecast_trend)
            .clamp(0.0, 100.0);
        let category = RiskCategory::from_score(composite);

        info!(
            composite,
            category = %category,
            pollution,
            stagnation,
            forecast_trend,
            escalation_probability,
            "risk scored"
        );

        RiskScore {
            score: composite as u8,
            composite,
            category,
            escalation_probability,
            components: RiskComponents {
                pollution,
                stagnation,
                forecast_trend,
            },
        }
    }
}

/// AQI share plus capped pm25 / pm10 / no2 boosts.
pub fn pollution_score(aqi: f64, p: &PollutantLevels) -> f64 {
    let aqi_part = (aqi / 500.0 * 100.0).min(100.0);
    let pm25 = (p.pm25.unwrap_or(0.0) / 300.0 * 30.0).min(30.0);
    let pm10 = (p.pm10.unwrap_or(0.0) / 500.0 * 15.0).min(15.0);
    let no2 = (p.no2.unwrap_or(0.0) / 200.0 * 20.0).min(20.0);
    (aqi_part + pm25 + pm10 + no2).min(100.0)
}

/// Poor-dispersion indicators. Missing wind and humidity read as 0.
pub fn stagnation_score(w: &WeatherConditions) -> f64 {
    let wind = w.wind_speed.unwrap_or(0.0);
    let humidity = w.humidity.unwrap_or(0.0);
    let mut risk = 0.0;

    if wind < 1.5 {
        risk += 40.0;
    } else if wind < 3.0 {
        risk += 20.0;
    }
    if humidity > 70.0 && wind < 2.0 {
        risk += 25.0;
    }
    if w.pressure.is_some_and(|p| p > 1010.0) {
        risk += 20.0;
    }
    if humidity > 80.0 {
        risk += 15.0;
    }

    f64::clamp(risk, 0.0, 100.0)
}

/// `(score, escalation_probability)` from the provider's 3-day pm25 outlook.
pub fn forecast_trend(current_pm25: Option<f64>, outlook: &ForecastOutlook) -> (f64, f64) {
    match (outlook.pm25_avg_3d, current_pm25) {
        (Some(avg), Some(now)) => {
            let diff = avg - now;
            if diff > 20.0 {
                (60.0, 0.7)
            } else if diff > 10.0 {
                (40.0, 0.5)
            } else if diff > 0.0 {
                (20.0, 0.3)
            } else {
                (10.0, 0.1)
            }
        }
        _ => (25.0, 0.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn context(aqi: f64) -> EnvironmentalContext {
        EnvironmentalContext {
            aqi,
            pollutants: PollutantLevels::default(),
            weather: WeatherConditions::default(),
            forecast: ForecastOutlook::default(),
            timestamp: None,
            station: None,
        }
    }

    #[test]
    fn severe_particulates_push_pollution_over_sixty() {
        let mut ctx = context(220.0);
        ctx.pollutants.pm25 = Some(160.0);
        let s = pollution_score(ctx.aqi, &ctx.pollutants);
        assert!(s >= 60.0, "pollution score {s}");
    }

    #[test]
    fn pollution_score_caps_at_hundred() {
        let p = PollutantLevels {
            pm25: Some(900.0),
            pm10: Some(900.0),
            no2: Some(900.0),
            ..PollutantLevels::default()
        };
        assert_eq!(pollution_score(480.0, &p), 100.0);
    }

    #[test]
    fn calm_humid_high_pressure_is_stagnant() {
        let w = WeatherConditions {
            temperature: Some(18.0),
            humidity: Some(85.0),
            pressure: Some(1016.0),
            wind_speed: Some(0.8),
        };
        assert_eq!(stagnation_score(&w), 100.0);
    }

    #[test]
    fn missing_weather_counts_as_still_dry_air() {
        // Wind 0 -> +40; humidity 0 and no pressure add nothing.
        assert_eq!(stagnation_score(&WeatherConditions::default()), 40.0);
    }

    #[test]
    fn forecast_trend_bands() {
        let outlook = |v| ForecastOutlook {
            pm25_avg_3d: Some(v),
            ..ForecastOutlook::default()
        };
        assert_eq!(forecast_trend(Some(50.0), &outlook(75.0)), (60.0, 0.7));
        assert_eq!(forecast_trend(Some(50.0), &outlook(65.0)), (40.0, 0.5));
        assert_eq!(forecast_trend(Some(50.0), &outlook(55.0)), (20.0, 0.3));
        assert_eq!(forecast_trend(Some(50.0), &outlook(50.0)), (10.0, 0.1));
        assert_eq!(forecast_trend(None, &outlook(50.0)), (25.0, 0.2));
        assert_eq!(forecast_trend(Some(50.0), &ForecastOutlook::default()), (25.0, 0.2));
    }

    #[test]
    fn composite_weights_and_truncates() {
        let mut ctx = context(250.0);
        ctx.weather.wind_speed = Some(5.0);
        ctx.weather.humidity = Some(40.0);
        // pollution 50, stagnation 0, trend 25 -> 0.5*50 + 0.25*25 = 31.25
        let s = CompositeRiskScorer::new().score(&ctx);
        assert!((s.composite - 31.25).abs() < 1e-9);
        assert_eq!(s.score, 31);
        assert_eq!(s.category, RiskCategory::Moderate);
        assert_eq!(s.escalation_probability, 0.2);
    }

    #[test]
    fn band_edges() {
        assert_eq!(RiskCategory::from_score(24.999), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(25.0), RiskCategory::Moderate);
        assert_eq!(RiskCategory::from_score(50.0), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(75.0), RiskCategory::Critical);
        assert_eq!(RiskCategory::from_score(100.0), RiskCategory::Critical);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: scoring is deterministic and always lands in exactly one band.
        #[test]
        fn identical_contexts_score_identically(
            aqi in 0.0f64..500.0,
            pm25 in prop::option::of(0.0f64..500.0),
            no2 in prop::option::of(0.0f64..300.0),
            wind in prop::option::of(0.0f64..10.0),
            humidity in prop::option::of(0.0f64..100.0),
            pressure in prop::option::of(980.0f64..1040.0),
            outlook in prop::option::of(0.0f64..500.0),
        ) {
            let mut ctx = context(aqi);
            ctx.pollutants.pm25 = pm25;
            ctx.pollutants.no2 = no2;
            ctx.weather = WeatherConditions { temperature: None, humidity, pressure, wind_speed: wind };
            ctx.forecast.pm25_avg_3d = outlook;

            let scorer = CompositeRiskScorer::new();
            let a = scorer.score(&ctx);
            let b = scorer.score(&ctx.clone());

            prop_assert_eq!(a, b);
            prop_assert!((0.0..=100.0).contains(&a.composite));
            prop_assert_eq!(a.category, RiskCategory::from_score(a.composite));
            prop_assert!((0.0..=1.0).contains(&a.escalation_probability));
        }
    }
}
