// src/prediction/predictor.rs
//
// Injury risk predictor for one sport: ensemble probabilities plus the
// explainable read-outs (injury type, time horizon, ranked factors and
// per-injury probabilities) derived from the feature values.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use super::ensemble::{Classifier, Ensemble};
use super::features::{Feature, FeatureInputs, FeatureVector};
use super::synthetic;
use crate::error::{Result, SentinelError};
use crate::profiles::{InjuryType, Sport, SportProfile};
use crate::types::PredictorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeHorizon {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "short-term")]
    ShortTerm,
    #[serde(rename = "long-term")]
    LongTerm,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ShortTerm => "short-term",
            Self::LongTerm => "long-term",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// 0–100
    pub injury_probability: f32,
    pub injury_type: String,
    pub time_horizon: TimeHorizon,
    /// 0 = safe, 1 = at-risk, 2 = injured
    pub risk_class: usize,
    pub contributing_factors: Vec<String>,
    /// Max averaged class probability, 0–1
    pub confidence: f32,
    pub all_injury_probabilities: BTreeMap<String, f32>,
}

pub struct InjuryPredictor {
    sport: Sport,
    profile: &'static SportProfile,
    config: PredictorConfig,
    model: Ensemble,
    importances: Vec<f32>,
}

impl InjuryPredictor {
    /// Generate the sport's synthetic set and fit the ensemble on it.
    pub fn train(sport: Sport, config: &PredictorConfig) -> Result<Self> {
        let started = Instant::now();
        let profile = sport.profile();
        info!(
            "🧠 Generating {} training samples for {}...",
            config.synthetic_samples, sport
        );
        let data = synthetic::generate(profile, config.synthetic_samples, config.random_seed)?;

        let mut model = Ensemble::new(config);
        model.fit(&data.x, &data.y)?;
        if model.n_classes() < 3 {
            return Err(SentinelError::Training(format!(
                "expected 3 risk classes, training set had {}",
                model.n_classes()
            )));
        }
        let importances = model.feature_importances();

        info!(
            "✅ Predictor trained for {} (RF + GB ensemble, {} trees each) in {:.1}s",
            sport,
            config.n_estimators,
            started.elapsed().as_secs_f32()
        );

        Ok(Self {
            sport,
            profile,
            config: config.clone(),
            model,
            importances,
        })
    }

    pub fn sport(&self) -> Sport {
        self.sport
    }

    pub fn feature_importances(&self) -> &[f32] {
        &self.importances
    }

    pub fn predict_from_inputs(&self, inputs: &FeatureInputs<'_>) -> PredictionResult {
        let features = FeatureVector::from_inputs(inputs, self.config.impact_proximity_threshold_px);
        self.predict(&features)
    }

    pub fn predict(&self, features: &FeatureVector) -> PredictionResult {
        let proba = self.model.predict_proba(features.as_slice());

        let (risk_class, confidence) = proba
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(bi, bp), (i, p)| if p > bp { (i, p) } else { (bi, bp) });
        let confidence = confidence.max(0.0);

        let injury_probability = match proba.len() {
            n if n >= 3 => proba[1] * 50.0 + proba[2] * 100.0,
            2 => proba[1] * 100.0,
            _ => 0.0,
        }
        .clamp(0.0, 100.0);

        PredictionResult {
            injury_probability,
            injury_type: self.injury_type(features),
            time_horizon: self.time_horizon(injury_probability, features),
            risk_class,
            contributing_factors: self.explain(features),
            confidence,
            all_injury_probabilities: self.injury_probabilities(features, injury_probability),
        }
    }

    /// Indicator-keyword score for one catalog entry, before its weight.
    fn indicator_score(indicator: &str, f: &FeatureVector) -> f32 {
        if indicator.contains("knee") {
            (170.0 - f[Feature::KneeAngleLeft]).max(0.0) + f[Feature::KneeAsymmetry]
        } else if indicator.contains("hip") {
            (170.0 - f[Feature::HipAngleLeft]).max(0.0) + f[Feature::HipAsymmetry]
        } else if indicator.contains("shoulder") {
            (f[Feature::ShoulderAngleLeft] - 150.0).max(0.0) + f[Feature::ShoulderAsymmetry]
        } else if indicator.contains("spine") {
            (170.0 - f[Feature::SpineAngle]).max(0.0)
        } else if indicator.contains("fatigue") {
            f[Feature::FatigueScore] * 0.5
        } else if indicator.contains("speed") || indicator.contains("ball") {
            f[Feature::ObjectSpeed] * 0.3
        } else if indicator.contains("facial") {
            f[Feature::FacialStress] * 0.4
        } else if indicator.contains("impact") {
            f[Feature::ImpactProximity] * 50.0
        } else {
            0.0
        }
    }

    fn injury_score(injury: &InjuryType, f: &FeatureVector) -> f32 {
        let raw: f32 = injury
            .primary_indicators
            .iter()
            .map(|ind| Self::indicator_score(ind, f))
            .sum();
        raw * injury.risk_weight
    }

    /// Highest-scoring catalog entry; the first entry wins when nothing
    /// scores positive.
    pub fn injury_type(&self, f: &FeatureVector) -> String {
        let Some(first) = self.profile.injuries.first() else {
            return "General Injury".to_string();
        };
        let mut best_score = -1.0f32;
        let mut best = first.name;
        for injury in self.profile.injuries {
            let score = Self::injury_score(injury, f);
            if score > best_score {
                best_score = score;
                best = injury.name;
            }
        }
        best.to_string()
    }

    pub fn time_horizon(&self, probability: f32, f: &FeatureVector) -> TimeHorizon {
        if probability > self.config.immediate_probability
            || f[Feature::ObjectSpeed] > self.profile.speed_threshold.danger_min
        {
            TimeHorizon::Immediate
        } else if probability > self.config.short_term_probability
            || f[Feature::FatigueScore] > self.config.short_term_fatigue
        {
            TimeHorizon::ShortTerm
        } else {
            TimeHorizon::LongTerm
        }
    }

    /// Top 5 features by importance × |value|, "Knee Angle Left: 25.0".
    pub fn explain(&self, f: &FeatureVector) -> Vec<String> {
        let mut ranked: Vec<(Feature, f32)> = Feature::ALL
            .iter()
            .map(|feat| {
                let imp = self.importances.get(feat.index()).copied().unwrap_or(0.0);
                (*feat, imp * f[*feat].abs())
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .iter()
            .take(5)
            .map(|(feat, _)| format!("{}: {:.1}", feat.readable(), f[*feat]))
            .collect()
    }

    /// Base probability spread over the catalog by weight, boosted for
    /// fatigue and speed indicators past their sub-thresholds.
    pub fn injury_probabilities(&self, f: &FeatureVector, base: f32) -> BTreeMap<String, f32> {
        let fatigued = f[Feature::FatigueScore] > 50.0;
        let fast = f[Feature::ObjectSpeed] > self.profile.speed_threshold.warning_max;

        self.profile
            .injuries
            .iter()
            .map(|injury| {
                let mut relevance = injury.risk_weight;
                for ind in injury.primary_indicators {
                    if fatigued && ind.contains("fatigue") {
                        relevance *= 1.3;
                    }
                    if fast && ind.contains("speed") {
                        relevance *= 1.4;
                    }
                }
                (injury.name.to_string(), (base * relevance / 1.5).min(100.0))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    /// One small trained predictor per sport shared across tests.
    pub(crate) static FOOTBALL: Lazy<InjuryPredictor> = Lazy::new(|| {
        InjuryPredictor::train(Sport::Football, &PredictorConfig::fast()).unwrap()
    });

    fn nominal() -> FeatureVector {
        FeatureVector::from_inputs(&FeatureInputs::default(), 500.0)
    }

    #[test]
    fn test_probabilities_are_bounded() {
        let mut risky = nominal();
        risky[Feature::KneeAngleLeft] = 25.0;
        risky[Feature::FatigueScore] = 95.0;
        risky[Feature::FacialStress] = 90.0;
        risky[Feature::ObjectSpeed] = 140.0;
        for f in [nominal(), risky] {
            let r = FOOTBALL.predict(&f);
            assert!((0.0..=100.0).contains(&r.injury_probability));
            assert!((0.0..=1.0).contains(&r.confidence));
            assert!(r.risk_class <= 2);
            assert!(r.contributing_factors.len() <= 5);
        }
    }

    #[test]
    fn test_danger_profile_scores_above_nominal() {
        let mut danger = nominal();
        danger[Feature::KneeAngleLeft] = 32.0;
        danger[Feature::KneeAngleRight] = 35.0;
        danger[Feature::SpineAngle] = 105.0;
        danger[Feature::FacialStress] = 85.0;
        danger[Feature::ObjectSpeed] = 125.0;
        danger[Feature::ImpactProximity] = 0.8;
        danger[Feature::FatigueScore] = 90.0;
        danger[Feature::TimeElapsedMinutes] = 80.0;

        let mut calm = nominal();
        calm[Feature::FacialStress] = 5.0;
        calm[Feature::ObjectSpeed] = 20.0;
        calm[Feature::FatigueScore] = 5.0;
        calm[Feature::TimeElapsedMinutes] = 5.0;

        let hi = FOOTBALL.predict(&danger);
        let lo = FOOTBALL.predict(&calm);
        assert!(
            hi.injury_probability > lo.injury_probability,
            "danger {} vs calm {}",
            hi.injury_probability,
            lo.injury_probability
        );
        assert_eq!(hi.risk_class, 2);
        assert_eq!(lo.risk_class, 0);
    }

    #[test]
    fn test_injury_map_matches_catalog() {
        let mut f = nominal();
        f[Feature::FatigueScore] = 80.0;
        f[Feature::ObjectSpeed] = 150.0;
        let map = FOOTBALL.injury_probabilities(&f, 100.0);
        let names: Vec<&str> = Sport::Football.profile().injuries.iter().map(|i| i.name).collect();
        assert_eq!(map.len(), names.len());
        for name in names {
            assert!(map.contains_key(name), "missing {name}");
        }
        assert!(map.values().all(|p| *p <= 100.0));
        // Concussion: 2.0 × 1.4 (ball_speed) / 1.5 × 100 caps at 100
        assert_eq!(map["Concussion"], 100.0);
        // Groin Strain: 1.0 / 1.5 × 50
        let half = FOOTBALL.injury_probabilities(&f, 50.0);
        assert!((half["Groin Strain"] - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_injury_type_keyword_scoring() {
        let mut f = nominal();
        f[Feature::KneeAngleLeft] = 40.0;
        f[Feature::KneeAsymmetry] = 30.0;
        assert_eq!(FOOTBALL.injury_type(&f), "ACL Tear");

        let mut ball = nominal();
        ball[Feature::KneeAngleLeft] = 170.0;
        ball[Feature::HipAngleLeft] = 170.0;
        ball[Feature::ObjectSpeed] = 130.0;
        ball[Feature::ImpactProximity] = 0.9;
        assert_eq!(FOOTBALL.injury_type(&ball), "Concussion");
    }

    #[test]
    fn test_time_horizon_rules() {
        let mut f = nominal();
        assert_eq!(FOOTBALL.time_horizon(10.0, &f), TimeHorizon::LongTerm);
        assert_eq!(FOOTBALL.time_horizon(45.0, &f), TimeHorizon::ShortTerm);
        assert_eq!(FOOTBALL.time_horizon(75.0, &f), TimeHorizon::Immediate);
        f[Feature::FatigueScore] = 61.0;
        assert_eq!(FOOTBALL.time_horizon(10.0, &f), TimeHorizon::ShortTerm);
        f[Feature::ObjectSpeed] = 121.0;
        assert_eq!(FOOTBALL.time_horizon(10.0, &f), TimeHorizon::Immediate);
    }

    #[test]
    fn test_factor_format() {
        let r = FOOTBALL.predict(&nominal());
        assert_eq!(r.contributing_factors.len(), 5);
        assert!(r.contributing_factors.iter().all(|s| s.contains(": ")));
        assert!(FOOTBALL.feature_importances().iter().all(|v| *v >= 0.0));
    }
}
