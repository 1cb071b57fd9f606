// src/prediction/synthetic.rs
//
// Synthetic training data. Each sample is drawn from one latent state
// (normal / warning / danger) using the sport's angle bands and speed
// thresholds, then labelled 0 / 1 / 2. Mix is 50/30/20, shuffled.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use super::features::{Feature, FeatureVector, NUM_FEATURES};
use crate::analysis::biomechanics::Joint;
use crate::error::{Result, SentinelError};
use crate::profiles::{AngleRange, SportProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatentState {
    Normal,
    Warning,
    Danger,
}

impl LatentState {
    pub fn label(&self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Warning => 1,
            Self::Danger => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<usize>,
    /// Training-only injury tag per sample ("None" for normal samples)
    pub injury_types: Vec<String>,
}

/// Uniform on [lo, hi), or `lo` when the interval is empty.
fn uniform(rng: &mut StdRng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

fn sample_angle(rng: &mut StdRng, r: &AngleRange, state: LatentState) -> f32 {
    let upper = rng.gen::<f32>() > 0.5;
    match (state, upper) {
        (LatentState::Normal, _) => uniform(rng, r.safe_min, r.safe_max),
        (LatentState::Warning, false) => uniform(rng, r.warning_min, r.safe_min),
        (LatentState::Warning, true) => uniform(rng, r.safe_max, r.warning_max),
        (LatentState::Danger, false) => uniform(rng, r.danger_min, r.warning_min),
        (LatentState::Danger, true) => uniform(rng, r.warning_max, r.danger_max),
    }
}

struct SampleGenerator<'a> {
    profile: &'a SportProfile,
    jitter: Normal<f32>,
    injury_weights: Option<WeightedIndex<f32>>,
}

impl<'a> SampleGenerator<'a> {
    fn new(profile: &'a SportProfile) -> Result<Self> {
        let jitter = Normal::new(0.0, 2.0).map_err(|e| SentinelError::Training(e.to_string()))?;
        let injury_weights = if profile.injuries.is_empty() {
            None
        } else {
            Some(
                WeightedIndex::new(profile.injuries.iter().map(|i| i.risk_weight))
                    .map_err(|e| SentinelError::Training(e.to_string()))?,
            )
        };
        Ok(Self {
            profile,
            jitter,
            injury_weights,
        })
    }

    fn joint_angle(&self, rng: &mut StdRng, joint: Joint, state: LatentState) -> f32 {
        match self.profile.angle_range(joint) {
            Some(r) => sample_angle(rng, r, state) + self.jitter.sample(rng),
            None if joint == Joint::Spine => uniform(rng, 140.0, 180.0),
            None => uniform(rng, 60.0, 170.0),
        }
    }

    fn sample(&self, rng: &mut StdRng, state: LatentState) -> (FeatureVector, String) {
        let mut v = FeatureVector([0.0; NUM_FEATURES]);

        let bilateral = [
            (Joint::Knee, Feature::KneeAngleLeft, Feature::KneeAngleRight),
            (Joint::Hip, Feature::HipAngleLeft, Feature::HipAngleRight),
            (Joint::Shoulder, Feature::ShoulderAngleLeft, Feature::ShoulderAngleRight),
            (Joint::Elbow, Feature::ElbowAngleLeft, Feature::ElbowAngleRight),
        ];
        for (joint, left, right) in bilateral {
            v[left] = self.joint_angle(rng, joint, state);
            v[right] = self.joint_angle(rng, joint, state);
        }
        v[Feature::SpineAngle] = self.joint_angle(rng, Joint::Spine, state);

        v[Feature::KneeAsymmetry] = (v[Feature::KneeAngleLeft] - v[Feature::KneeAngleRight]).abs();
        v[Feature::HipAsymmetry] = (v[Feature::HipAngleLeft] - v[Feature::HipAngleRight]).abs();
        v[Feature::ShoulderAsymmetry] =
            (v[Feature::ShoulderAngleLeft] - v[Feature::ShoulderAngleRight]).abs();

        let st = &self.profile.speed_threshold;
        let (facial, speed, proximity, fatigue, minutes) = match state {
            LatentState::Normal => ((0.0, 25.0), (0.0, st.safe_max), (0.0, 0.3), (0.0, 30.0), (0.0, 30.0)),
            LatentState::Warning => (
                (20.0, 60.0),
                (st.safe_max * 0.7, st.warning_max),
                (0.2, 0.6),
                (25.0, 65.0),
                (20.0, 60.0),
            ),
            LatentState::Danger => (
                (50.0, 100.0),
                (st.warning_max * 0.8, st.danger_min * 1.2),
                (0.5, 1.0),
                (55.0, 100.0),
                (40.0, 90.0),
            ),
        };
        v[Feature::FacialStress] = uniform(rng, facial.0, facial.1);
        v[Feature::ObjectSpeed] = uniform(rng, speed.0, speed.1);
        v[Feature::ImpactProximity] = uniform(rng, proximity.0, proximity.1);
        v[Feature::FatigueScore] = uniform(rng, fatigue.0, fatigue.1);
        v[Feature::TimeElapsedMinutes] = uniform(rng, minutes.0, minutes.1);

        let injury = match (state, &self.injury_weights) {
            (LatentState::Danger, Some(weights)) => self.profile.injuries[weights.sample(rng)].name,
            (LatentState::Warning, Some(_)) => {
                self.profile.injuries[rng.gen_range(0..self.profile.injuries.len())].name
            }
            _ => "None",
        };

        (v, injury.to_string())
    }
}

pub fn generate(profile: &SportProfile, n_samples: usize, seed: u64) -> Result<SyntheticDataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let generator = SampleGenerator::new(profile)?;

    let n_normal = n_samples / 2;
    let n_warning = n_samples * 3 / 10;
    let n_danger = n_samples / 5;
    let mut states: Vec<LatentState> = std::iter::repeat(LatentState::Normal)
        .take(n_normal)
        .chain(std::iter::repeat(LatentState::Warning).take(n_warning))
        .chain(std::iter::repeat(LatentState::Danger).take(n_danger))
        .collect();
    states.resize(n_samples, LatentState::Normal);
    states.shuffle(&mut rng);

    let mut dataset = SyntheticDataset {
        x: Vec::with_capacity(n_samples),
        y: Vec::with_capacity(n_samples),
        injury_types: Vec::with_capacity(n_samples),
    };
    for state in states {
        let (v, injury) = generator.sample(&mut rng, state);
        dataset.x.push(v.0.to_vec());
        dataset.y.push(state.label());
        dataset.injury_types.push(injury);
    }

    debug!(
        "Synthetic dataset for {}: {} samples ({} normal / {} warning / {} danger)",
        profile.sport, n_samples, n_normal, n_warning, n_danger
    );
    Ok(dataset)
}
