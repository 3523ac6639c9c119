//! Heuristic interpretation layered on top of the risk score.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use aqcast_core::{EnvironmentalContext, Pollutant};

use crate::score::{CompositeRiskScorer, RiskCategory, RiskScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollutionSource {
    Combustion,
    Dust,
    Traffic,
    Industrial,
    Photochemical,
    Vehicle,
    Mixed,
}

impl PollutionSource {
    pub fn from_dominant(dominant: Option<Pollutant>) -> Self {
        match dominant {
            Some(Pollutant::Pm25) => PollutionSource::Combustion,
            Some(Pollutant::Pm10) => PollutionSource::Dust,
            Some(Pollutant::No2) => PollutionSource::Traffic,
            Some(Pollutant::So2) => PollutionSource::Industrial,
            Some(Pollutant::O3) => PollutionSource::Photochemical,
            Some(Pollutant::Co) => PollutionSource::Vehicle,
            None => PollutionSource::Mixed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PollutionSource::Combustion => "Combustion-driven",
            PollutionSource::Dust => "Dust-driven",
            PollutionSource::Traffic => "Traffic-driven",
            PollutionSource::Industrial => "Industrial-driven",
            PollutionSource::Photochemical => "Photochemical",
            PollutionSource::Vehicle => "Vehicle-driven",
            PollutionSource::Mixed => "Mixed-source",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PollutionSource::Combustion => {
                "High PM2.5 indicates combustion sources (vehicles, industry, biomass burning)"
            }
            PollutionSource::Dust => "High PM10 suggests dust resuspension, construction, or natural sources",
            PollutionSource::Traffic => "Elevated NO2 strongly indicates vehicular traffic emissions",
            PollutionSource::Industrial => "High SO2 points to industrial emissions or power generation",
            PollutionSource::Photochemical => {
                "Ozone levels indicate secondary photochemical formation from NOx and VOC"
            }
            PollutionSource::Vehicle => "Elevated CO indicates incomplete combustion from traffic or heating",
            PollutionSource::Mixed => "No dominant pollutant identified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    StagnationEscalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyWarning {
    pub level: AlertLevel,
    /// 0..=100.
    pub severity: u8,
}

/// Still air with elevated pm25 that the provider expects to rise further.
pub fn detect_early_warning(ctx: &EnvironmentalContext) -> Option<EarlyWarning> {
    let wind = ctx.weather.wind_speed.unwrap_or(0.0);
    let pm25 = ctx.pollutants.pm25.unwrap_or(0.0);
    let outlook = ctx.forecast.pm25_avg_3d?;

    if wind < 1.0 && pm25 > 50.0 && outlook > pm25 {
        let severity = (outlook / 300.0 * 100.0).min(100.0) as u8;
        warn!(level = "STAGNATION_ESCALATION", severity, "early warning raised");
        return Some(EarlyWarning {
            level: AlertLevel::StagnationEscalation,
            severity,
        });
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TrafficRestriction,
    WaterSpraying,
    IndustrialAudit,
    ConstructionHalt,
    RespiratoryAlert,
    SchoolClosure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: ActionKind,
    pub action: String,
    pub reason: String,
    /// 1 is most urgent.
    pub priority: u8,
    pub time_horizon: String,
}

impl Recommendation {
    fn new(kind: ActionKind, action: &str, reason: String, priority: u8, horizon: &str) -> Self {
        Self {
            kind,
            action: action.to_string(),
            reason,
            priority,
            time_horizon: horizon.to_string(),
        }
    }
}

/// Government actions triggered by the current readings.
pub fn recommend_actions(ctx: &EnvironmentalContext, category: RiskCategory) -> Vec<Recommendation> {
    let p = &ctx.pollutants;
    let pm25 = p.pm25.unwrap_or(0.0);
    let pm10 = p.pm10.unwrap_or(0.0);
    let no2 = p.no2.unwrap_or(0.0);
    let so2 = p.so2.unwrap_or(0.0);
    let wind = ctx.weather.wind_speed.unwrap_or(0.0);
    let humidity = ctx.weather.humidity.unwrap_or(0.0);
    let aqi = ctx.aqi;
    let base = category.priority();

    let mut out = Vec::new();

    if no2 > 80.0 || pm25 > 150.0 {
        out.push(Recommendation::new(
            ActionKind::TrafficRestriction,
            "Implement traffic restrictions in hotspot zones",
            format!("NO2={no2:.1} ppb indicates heavy traffic; PM2.5={pm25:.1} µg/m³ poses health risk"),
            base,
            "Immediate",
        ));
    }
    if pm10 > 200.0 && wind < 2.0 {
        out.push(Recommendation::new(
            ActionKind::WaterSpraying,
            "Deploy water spraying vehicles in high-pollution zones",
            format!("PM10={pm10:.1} µg/m³ with low wind speed ({wind:.1} m/s) allows dust accumulation"),
            base,
            "2-4 hours",
        ));
    }
    if so2 > 30.0 {
        out.push(Recommendation::new(
            ActionKind::IndustrialAudit,
            "Conduct emergency industrial pollution audit",
            format!("SO2={so2:.1} ppb exceeds safe levels; likely industrial source"),
            base.saturating_sub(1).max(1),
            "24 hours",
        ));
    }
    if wind < 1.0 && aqi > 200.0 {
        out.push(Recommendation::new(
            ActionKind::ConstructionHalt,
            "Halt construction activities in stagnant air conditions",
            format!("Wind speed={wind:.1} m/s and AQI={aqi:.0} create a critical environment"),
            base,
            "Immediate",
        ));
    }
    if pm25 > 100.0 && humidity > 70.0 {
        out.push(Recommendation::new(
            ActionKind::RespiratoryAlert,
            "Issue respiratory health alert; increase medical preparedness",
            format!("High PM2.5={pm25:.1} with humidity={humidity:.0}% increases respiratory risk"),
            base,
            "Immediate",
        ));
    }
    if aqi > 250.0 {
        out.push(Recommendation::new(
            ActionKind::SchoolClosure,
            "Consider closing schools and outdoor events",
            format!("AQI={aqi:.0} reaches hazardous levels; vulnerable groups at severe risk"),
            1,
            "Immediate",
        ));
    }

    info!(count = out.len(), category = %category, "recommendations generated");
    out
}

pub fn health_tip(ctx: &EnvironmentalContext, category: RiskCategory) -> &'static str {
    match category {
        RiskCategory::Critical => {
            "Air quality is hazardous. Avoid all outdoor physical activity and wear an N95 mask if you must go outside."
        }
        RiskCategory::High => {
            "Significant pollution detected. Vulnerable groups should stay indoors; others should limit prolonged outdoor exertion."
        }
        RiskCategory::Moderate if ctx.pollutants.pm25.unwrap_or(0.0) > 35.0 => {
            "Particulate levels are slightly elevated. Sensitive individuals should consider reducing heavy outdoor work."
        }
        RiskCategory::Moderate => {
            "Air quality is acceptable; however, some individuals may be sensitive to specific pollutants."
        }
        RiskCategory::Low if ctx.aqi < 50.0 => {
            "Excellent air quality today. A perfect time for outdoor activities and fresh air ventilation."
        }
        RiskCategory::Low => "Air quality is good. Business as usual for most citizens.",
    }
}

/// Score plus every derived insight for one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub context: EnvironmentalContext,
    pub risk: RiskScore,
    pub source: PollutionSource,
    pub early_warning: Option<EarlyWarning>,
    pub recommendations: Vec<Recommendation>,
    pub health_tip: String,
}

impl RiskAssessment {
    pub fn evaluate(scorer: &CompositeRiskScorer, context: EnvironmentalContext) -> Self {
        let risk = scorer.score(&context);
        let source = PollutionSource::from_dominant(context.pollutants.dominant);
        let early_warning = detect_early_warning(&context);
        let recommendations = recommend_actions(&context, risk.category);
        let health_tip = health_tip(&context, risk.category).to_string();

        Self {
            context,
            risk,
            source,
            early_warning,
            recommendations,
            health_tip,
        }
    }
}
