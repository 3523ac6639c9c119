//! `aqcast-risk`
//!
//! **Responsibility:** composite environmental risk scoring.
//!
//! Inputs are [`aqcast_core::EnvironmentalContext`] values only; this crate never
//! fetches data or touches the forecast model. Output is an insight, not a
//! forecast, and scoring is deterministic for identical contexts.

pub mod intelligence;
pub mod score;

pub use intelligence::{
    ActionKind, AlertLevel, EarlyWarning, PollutionSource, Recommendation, RiskAssessment, detect_early_warning,
    health_tip, recommend_actions,
};
pub use score::{CompositeRiskScorer, RiskCategory, RiskComponents, RiskScore, RiskWeights};
