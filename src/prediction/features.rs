// src/prediction/features.rs
//
// Fixed-order feature vector shared by synthetic training and live
// prediction. Order is part of the model: never reorder variants.

use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::analysis::biomechanics::Joint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    KneeAngleLeft,
    KneeAngleRight,
    HipAngleLeft,
    HipAngleRight,
    ShoulderAngleLeft,
    ShoulderAngleRight,
    ElbowAngleLeft,
    ElbowAngleRight,
    SpineAngle,
    KneeAsymmetry,
    HipAsymmetry,
    ShoulderAsymmetry,
    FacialStress,
    ObjectSpeed,
    ImpactProximity,
    FatigueScore,
    TimeElapsedMinutes,
}

pub const NUM_FEATURES: usize = 17;

impl Feature {
    pub const ALL: [Feature; NUM_FEATURES] = [
        Self::KneeAngleLeft,
        Self::KneeAngleRight,
        Self::HipAngleLeft,
        Self::HipAngleRight,
        Self::ShoulderAngleLeft,
        Self::ShoulderAngleRight,
        Self::ElbowAngleLeft,
        Self::ElbowAngleRight,
        Self::SpineAngle,
        Self::KneeAsymmetry,
        Self::HipAsymmetry,
        Self::ShoulderAsymmetry,
        Self::FacialStress,
        Self::ObjectSpeed,
        Self::ImpactProximity,
        Self::FatigueScore,
        Self::TimeElapsedMinutes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::KneeAngleLeft => "knee_angle_left",
            Self::KneeAngleRight => "knee_angle_right",
            Self::HipAngleLeft => "hip_angle_left",
            Self::HipAngleRight => "hip_angle_right",
            Self::ShoulderAngleLeft => "shoulder_angle_left",
            Self::ShoulderAngleRight => "shoulder_angle_right",
            Self::ElbowAngleLeft => "elbow_angle_left",
            Self::ElbowAngleRight => "elbow_angle_right",
            Self::SpineAngle => "spine_angle",
            Self::KneeAsymmetry => "knee_asymmetry",
            Self::HipAsymmetry => "hip_asymmetry",
            Self::ShoulderAsymmetry => "shoulder_asymmetry",
            Self::FacialStress => "facial_stress",
            Self::ObjectSpeed => "object_speed",
            Self::ImpactProximity => "impact_proximity",
            Self::FatigueScore => "fatigue_score",
            Self::TimeElapsedMinutes => "time_elapsed_minutes",
        }
    }

    /// "knee_angle_left" → "Knee Angle Left"
    pub fn readable(&self) -> String {
        self.name()
            .split('_')
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f32; NUM_FEATURES]);

impl Index<Feature> for FeatureVector {
    type Output = f32;

    fn index(&self, f: Feature) -> &f32 {
        &self.0[f.index()]
    }
}

impl IndexMut<Feature> for FeatureVector {
    fn index_mut(&mut self, f: Feature) -> &mut f32 {
        &mut self.0[f.index()]
    }
}

/// Everything the predictor reads from one frame's analyses.
#[derive(Debug, Clone)]
pub struct FeatureInputs<'a> {
    /// Angle map keyed "joint_side" (e.g. "knee_left", "spine_center")
    pub joint_angles: Option<&'a BTreeMap<String, f32>>,
    pub asymmetry: Option<&'a BTreeMap<Joint, f32>>,
    pub facial_stress: f32,
    pub object_speed: f32,
    /// Pixels to the nearest body zone, infinite when unknown
    pub closest_body_distance: f32,
    pub fatigue_score: f32,
    pub time_elapsed_minutes: f32,
}

impl Default for FeatureInputs<'_> {
    fn default() -> Self {
        Self {
            joint_angles: None,
            asymmetry: None,
            facial_stress: 0.0,
            object_speed: 0.0,
            closest_body_distance: f32::INFINITY,
            fatigue_score: 0.0,
            time_elapsed_minutes: 0.0,
        }
    }
}

/// Neutral angle used when a joint was not measured this frame.
const ANGLE_DEFAULTS: [(Feature, &str, f32); 9] = [
    (Feature::KneeAngleLeft, "knee_left", 150.0),
    (Feature::KneeAngleRight, "knee_right", 150.0),
    (Feature::HipAngleLeft, "hip_left", 160.0),
    (Feature::HipAngleRight, "hip_right", 160.0),
    (Feature::ShoulderAngleLeft, "shoulder_left", 90.0),
    (Feature::ShoulderAngleRight, "shoulder_right", 90.0),
    (Feature::ElbowAngleLeft, "elbow_left", 140.0),
    (Feature::ElbowAngleRight, "elbow_right", 140.0),
    (Feature::SpineAngle, "spine_center", 170.0),
];

/// 1 − distance/threshold, 0 at or beyond the threshold (and when unknown).
pub fn impact_proximity(distance_px: f32, threshold_px: f32) -> f32 {
    if !distance_px.is_finite() || threshold_px <= 0.0 || distance_px >= threshold_px {
        return 0.0;
    }
    (1.0 - distance_px / threshold_px).clamp(0.0, 1.0)
}

impl FeatureVector {
    pub fn from_inputs(inputs: &FeatureInputs<'_>, proximity_threshold_px: f32) -> Self {
        let mut v = FeatureVector([0.0; NUM_FEATURES]);

        for (feature, key, default) in ANGLE_DEFAULTS {
            v[feature] = inputs
                .joint_angles
                .and_then(|m| m.get(key).copied())
                .unwrap_or(default);
        }

        let asym = |joint: Joint| {
            inputs
                .asymmetry
                .and_then(|m| m.get(&joint).copied())
                .unwrap_or(0.0)
        };
        v[Feature::KneeAsymmetry] = asym(Joint::Knee);
        v[Feature::HipAsymmetry] = asym(Joint::Hip);
        v[Feature::ShoulderAsymmetry] = asym(Joint::Shoulder);

        v[Feature::FacialStress] = inputs.facial_stress;
        v[Feature::ObjectSpeed] = inputs.object_speed;
        v[Feature::ImpactProximity] =
            impact_proximity(inputs.closest_body_distance, proximity_threshold_px);
        v[Feature::FatigueScore] = inputs.fatigue_score;
        v[Feature::TimeElapsedMinutes] = inputs.time_elapsed_minutes;
        v
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}
