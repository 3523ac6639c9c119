//! Autoregressive multi-day forecasting.
//!
//! Per day:
//! 1. predict one normalized value from the current window,
//! 2. map it back to AQI and clip,
//! 3. on day 1, anchor it halfway towards the live AQI,
//! 4. slide the window, writing the re-normalized reported AQI into the new row.
//!
//! After the loop, day-over-day moves are clamped and, when the live AQI
//! disagrees with day 1 by more than the tolerance, all days are scaled by a
//! bounded correction factor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aqcast_core::{ForecastError, ForecastResult};

use crate::features::Feature;
use crate::model::SequenceModel;
use crate::sequence::SequenceMode;
use crate::transform::NormalizationTransform;
use crate::window::ForecastWindow;

/// Pipeline stages, used for logging transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ForecastStage {
    FetchLive,
    BuildSequence(SequenceMode),
    ForecastLoop { day: usize },
    SafetyBound,
    Respond,
    Error,
}

impl core::fmt::Display for ForecastStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ForecastStage::FetchLive => f.write_str("FETCH_LIVE"),
            ForecastStage::BuildSequence(mode) => write!(f, "BUILD_SEQUENCE[{mode}]"),
            ForecastStage::ForecastLoop { day } => write!(f, "FORECAST_LOOP[day {day}]"),
            ForecastStage::SafetyBound => f.write_str("SAFETY_BOUND"),
            ForecastStage::Respond => f.write_str("RESPOND"),
            ForecastStage::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub horizon_days: usize,
    pub aqi_floor: f64,
    pub aqi_ceiling: f64,
    /// Largest allowed absolute change between consecutive days.
    pub max_daily_change: f64,
    /// Relative day-1 error versus live AQI that triggers correction.
    pub correction_threshold: f64,
    pub min_correction: f64,
    pub max_correction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_days: 3,
            aqi_floor: 0.0,
            aqi_ceiling: 500.0,
            max_daily_change: 50.0,
            correction_threshold: 0.15,
            min_correction: 0.7,
            max_correction: 1.3,
        }
    }
}

impl EngineConfig {
    pub fn with_horizon(mut self, days: usize) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_max_daily_change(mut self, max: f64) -> Self {
        self.max_daily_change = max;
        self
    }

    fn clip(&self, aqi: f64) -> f64 {
        aqi.clamp(self.aqi_floor, self.aqi_ceiling)
    }
}

/// Bounded forecast plus the intermediate values that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Final per-day AQI values.
    pub days: Vec<f64>,
    /// Clipped model predictions before anchoring and bounding.
    pub raw: Vec<f64>,
    /// Factor applied by the live safety check, if it fired.
    pub correction_factor: Option<f64>,
}

/// Runs the autoregressive loop for one window.
#[derive(Clone)]
pub struct ForecastEngine {
    model: Arc<dyn SequenceModel>,
    transform: Arc<NormalizationTransform>,
    config: EngineConfig,
}

impl core::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ForecastEngine {
    pub fn new(model: Arc<dyn SequenceModel>, transform: Arc<NormalizationTransform>) -> Self {
        Self {
            model,
            transform,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forecast `horizon_days` values from `window`.
    ///
    /// `live_aqi` is the AQI fetched during this request; it drives day-1
    /// anchoring and the final correction. Pass `None` for cached or
    /// historical-only data.
    pub fn run(&self, window: ForecastWindow, live_aqi: Option<f64>) -> ForecastResult<EngineOutput> {
        let cfg = &self.config;
        let mut current = window;
        let mut raw = Vec::with_capacity(cfg.horizon_days);
        let mut days = Vec::with_capacity(cfg.horizon_days);

        for day in 1..=cfg.horizon_days {
            let stage = ForecastStage::ForecastLoop { day };
            debug!(stage = %stage, model = self.model.name());

            let scaled = self.model.predict(&current)?;
            if !scaled.is_finite() {
                return Err(ForecastError::inference(format!(
                    "{} returned non-finite output on day {day}",
                    self.model.name()
                )));
            }
            let predicted = cfg.clip(self.transform.inverse_target(scaled));
            raw.push(predicted);

            let reported = match live_aqi {
                Some(live) if day == 1 => cfg.clip(anchor(predicted, live)),
                _ => predicted,
            };
            days.push(reported);

            // Feed back the real-valued AQI, re-normalized, not the raw model output.
            let next = current
                .last_row()
                .with(Feature::Aqi, self.transform.normalize_aqi(reported));
            current = current.slide(&next);
        }

        let stage = ForecastStage::SafetyBound;
        debug!(stage = %stage);
        clamp_daily_change(&mut days, cfg.max_daily_change);

        let correction_factor = live_aqi.and_then(|live| apply_live_correction(&mut days, live, cfg));
        if correction_factor.is_some() {
            clamp_daily_change(&mut days, cfg.max_daily_change);
        }

        info!(
            days = ?days,
            raw = ?raw,
            live_aqi = ?live_aqi,
            correction = ?correction_factor,
            "forecast bounded"
        );

        Ok(EngineOutput {
            days,
            raw,
            correction_factor,
        })
    }
}

/// Day-1 anchoring: start from the live value and move half the model-implied distance.
pub fn anchor(predicted: f64, live_aqi: f64) -> f64 {
    let delta = (predicted - live_aqi) / 2.0;
    live_aqi + delta
}

/// Limit each day-over-day move to `max_change`, keeping the first day fixed.
pub fn clamp_daily_change(days: &mut [f64], max_change: f64) {
    for i in 1..days.len() {
        let prev = days[i - 1];
        days[i] = days[i].clamp(prev - max_change, prev + max_change);
    }
}

/// Scale every day by `live / day1` (bounded) when day 1 strays too far from live.
///
/// Returns the applied factor, or `None` when no correction was needed.
pub fn apply_live_correction(days: &mut [f64], live_aqi: f64, cfg: &EngineConfig) -> Option<f64> {
    let day1 = *days.first()?;
    if live_aqi <= 0.0 || day1 <= 0.0 {
        return None;
    }

    let relative_error = (day1 - live_aqi).abs() / live_aqi;
    if relative_error <= cfg.correction_threshold {
        return None;
    }

    let factor = (live_aqi / day1).clamp(cfg.min_correction, cfg.max_correction);
    for d in days.iter_mut() {
        *d = cfg.clip(*d * factor);
    }
    Some(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_COUNT, FeatureVector};
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Returns a scripted sequence of normalized outputs and records the windows it saw.
    struct ScriptedModel {
        outputs: Vec<f64>,
        seen: Mutex<Vec<ForecastWindow>>,
    }

    impl ScriptedModel {
        fn new(outputs: Vec<f64>) -> Self {
            Self {
                outputs,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl SequenceModel for ScriptedModel {
        fn predict(&self, window: &ForecastWindow) -> ForecastResult<f64> {
            let mut seen = self.seen.lock().unwrap();
            let out = self.outputs[seen.len() % self.outputs.len()];
            seen.push(window.clone());
            Ok(out)
        }
    }

    struct FailingModel;

    impl SequenceModel for FailingModel {
        fn predict(&self, _window: &ForecastWindow) -> ForecastResult<f64> {
            Err(ForecastError::inference("boom"))
        }
    }

    struct NanModel;

    impl SequenceModel for NanModel {
        fn predict(&self, _window: &ForecastWindow) -> ForecastResult<f64> {
            Ok(f64::NAN)
        }
    }

    fn transform() -> Arc<NormalizationTransform> {
        Arc::new(NormalizationTransform::new(vec![0.0; 12], vec![500.0; 12], None, None).unwrap())
    }

    fn window() -> ForecastWindow {
        ForecastWindow::padded(&[FeatureVector::new([0.3; FEATURE_COUNT])]).unwrap()
    }

    fn engine(model: Arc<dyn SequenceModel>) -> ForecastEngine {
        ForecastEngine::new(model, transform())
    }

    #[test]
    fn historical_forecast_is_inverse_normalized() {
        let model = Arc::new(ScriptedModel::new(vec![0.3, 0.32, 0.34]));
        let out = engine(model).run(window(), None).unwrap();

        assert_eq!(out.days.len(), 3);
        assert!((out.days[0] - 150.0).abs() < 1e-9);
        assert!((out.days[1] - 160.0).abs() < 1e-9);
        assert!((out.days[2] - 170.0).abs() < 1e-9);
        assert_eq!(out.correction_factor, None);
    }

    #[test]
    fn predictions_are_clipped_to_scale() {
        let model = Arc::new(ScriptedModel::new(vec![1.4, 1.5, 1.6]));
        let out = engine(model).run(window(), None).unwrap();
        assert_eq!(out.raw, vec![500.0, 500.0, 500.0]);
        assert!(out.days.iter().all(|d| *d == 500.0));
    }

    #[test]
    fn day_one_is_anchored_halfway_to_live() {
        // Model says 180, live is 170: anchored day 1 = 175 (within 15%, no correction).
        let model = Arc::new(ScriptedModel::new(vec![0.36]));
        let out = engine(model).run(window(), Some(170.0)).unwrap();

        assert!((out.raw[0] - 180.0).abs() < 1e-9);
        assert!((out.days[0] - 175.0).abs() < 1e-9);
        assert_eq!(out.correction_factor, None);
    }

    #[test]
    fn slide_feeds_back_renormalized_reported_value() {
        let model = Arc::new(ScriptedModel::new(vec![0.36, 0.4, 0.4]));
        let engine = ForecastEngine::new(model.clone(), transform());
        engine.run(window(), Some(170.0)).unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        // Day 2 saw day 1's anchored 175 written as 175/500.
        assert!((seen[1].last_row().get(Feature::Aqi) - 0.35).abs() < 1e-12);
        // Other features are carried over from the previous last row.
        assert_eq!(seen[1].last_row().get(Feature::Pm25), 0.3);
        // The first window was not touched by sliding.
        assert_eq!(seen[0].last_row().get(Feature::Aqi), 0.3);
    }

    #[test]
    fn large_live_disagreement_is_corrected_towards_live() {
        // Raw day 1 = 300, anchored = 225, live = 150: error 50% -> factor 0.667 clipped to 0.7.
        let model = Arc::new(ScriptedModel::new(vec![0.6, 0.6, 0.6]));
        let out = engine(model).run(window(), Some(150.0)).unwrap();

        assert_eq!(out.correction_factor, Some(0.7));
        assert!((out.days[0] - 157.5).abs() < 1e-9);
        assert!(out.days[0] > 150.0 && out.days[0] < 225.0);
    }

    #[test]
    fn model_errors_propagate() {
        let err = engine(Arc::new(FailingModel)).run(window(), None).unwrap_err();
        assert_eq!(err, ForecastError::inference("boom"));
    }

    #[test]
    fn non_finite_model_output_is_an_inference_failure() {
        let err = engine(Arc::new(NanModel)).run(window(), Some(150.0)).unwrap_err();
        assert!(matches!(err, ForecastError::InferenceFailed(_)));

        let err = engine(Arc::new(ScriptedModel::new(vec![0.3, f64::INFINITY])))
            .run(window(), None)
            .unwrap_err();
        assert!(matches!(&err, ForecastError::InferenceFailed(msg) if msg.contains("day 2")));
    }

    #[test]
    fn horizon_and_daily_limit_are_configurable() {
        let model = Arc::new(ScriptedModel::new(vec![0.2, 0.6]));
        let config = EngineConfig::default().with_horizon(5).with_max_daily_change(20.0);
        let out = engine(model).with_config(config).run(window(), None).unwrap();

        assert_eq!(out.days.len(), 5);
        let expected = [100.0, 120.0, 100.0, 120.0, 100.0];
        for (got, want) in out.days.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{:?}", out.days);
        }
        assert!((out.raw[1] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn daily_change_clamp_keeps_first_day() {
        let mut days = vec![100.0, 220.0, 90.0];
        clamp_daily_change(&mut days, 50.0);
        assert_eq!(days, vec![100.0, 150.0, 100.0]);
    }

    #[test]
    fn correction_skipped_within_tolerance() {
        let mut days = vec![160.0, 170.0, 180.0];
        assert_eq!(apply_live_correction(&mut days, 150.0, &EngineConfig::default()), None);
        assert_eq!(days, vec![160.0, 170.0, 180.0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every returned day lies in [0, 500] and consecutive days differ by <= 50.
        #[test]
        fn forecasts_are_bounded(
            outputs in prop::collection::vec(-1.0f64..2.0, 3),
            live in prop::option::of(1.0f64..500.0),
        ) {
            let model = Arc::new(ScriptedModel::new(outputs));
            let out = engine(model).run(window(), live).unwrap();

            prop_assert_eq!(out.days.len(), 3);
            for d in &out.days {
                prop_assert!((0.0..=500.0).contains(d));
            }
            for pair in out.days.windows(2) {
                prop_assert!((pair[1] - pair[0]).abs() <= 50.0 + 1e-9);
            }
        }

        /// Property: when the correction fires, its factor stays within [0.7, 1.3]
        /// and day 1 moves towards the live AQI.
        #[test]
        fn correction_moves_day_one_towards_live(raw_day1 in 0.0f64..1.0) {
            let live = 150.0;
            let model = Arc::new(ScriptedModel::new(vec![raw_day1, 0.3, 0.3]));
            let out = engine(model).run(window(), Some(live)).unwrap();

            let anchored = (anchor(out.raw[0], live)).clamp(0.0, 500.0);
            if let Some(factor) = out.correction_factor {
                prop_assert!((0.7..=1.3).contains(&factor));
                prop_assert!((out.days[0] - live).abs() <= (anchored - live).abs() + 1e-9);
            } else {
                prop_assert!((anchored - live).abs() / live <= 0.15 + 1e-12);
            }
        }
    }
}
