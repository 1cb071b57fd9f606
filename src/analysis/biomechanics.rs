// src/analysis/biomechanics.rs
//
// Biomechanical state tracker: keypoints → joint angles, bilateral asymmetry,
// fatigue drift over a rolling window, posture alerts against the sport's
// angle bands, and the additive pose risk score.
//
// The fatigue baseline is captured once per session on the first frame with
// a pose and is never overwritten until reset(). The angle history is pruned
// by timestamp on every append, so the window always covers the last
// `fatigue_window_seconds` of frame time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::{debug, info};

use crate::profiles::SportProfile;
use crate::types::{BiomechanicsConfig, BodyPart, Keypoint, KeypointSet};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Knee,
    Elbow,
    Shoulder,
    Hip,
    Spine,
}

impl Joint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knee => "knee",
            Self::Elbow => "elbow",
            Self::Shoulder => "shoulder",
            Self::Hip => "hip",
            Self::Spine => "spine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        }
    }
}

/// Joint-side identity used for baselines and the angle map ("knee_left").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointKey {
    pub joint: Joint,
    pub side: Side,
}

impl fmt::Display for JointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.joint.as_str(), self.side.as_str())
    }
}

/// (joint, side, first limb end, vertex, second limb end)
pub const JOINT_DEFINITIONS: [(Joint, Side, BodyPart, BodyPart, BodyPart); 9] = [
    (Joint::Knee, Side::Left, BodyPart::LeftHip, BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (Joint::Knee, Side::Right, BodyPart::RightHip, BodyPart::RightKnee, BodyPart::RightAnkle),
    (Joint::Elbow, Side::Left, BodyPart::LeftShoulder, BodyPart::LeftElbow, BodyPart::LeftWrist),
    (Joint::Elbow, Side::Right, BodyPart::RightShoulder, BodyPart::RightElbow, BodyPart::RightWrist),
    (Joint::Shoulder, Side::Left, BodyPart::LeftElbow, BodyPart::LeftShoulder, BodyPart::LeftHip),
    (Joint::Shoulder, Side::Right, BodyPart::RightElbow, BodyPart::RightShoulder, BodyPart::RightHip),
    (Joint::Hip, Side::Left, BodyPart::LeftShoulder, BodyPart::LeftHip, BodyPart::LeftKnee),
    (Joint::Hip, Side::Right, BodyPart::RightShoulder, BodyPart::RightHip, BodyPart::RightKnee),
    (Joint::Spine, Side::Center, BodyPart::LeftShoulder, BodyPart::LeftHip, BodyPart::LeftKnee),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointAngle {
    pub joint: Joint,
    pub side: Side,
    pub angle: f32,
    /// Inside the sport's safe band (true when the profile has no band)
    pub is_safe: bool,
    /// Degrees beyond the nearest safe bound, 0 when safe
    pub threshold_exceeded_by: f32,
}

impl JointAngle {
    pub fn key(&self) -> JointKey {
        JointKey {
            joint: self.joint,
            side: self.side,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureSeverity {
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostureAlert {
    pub joint: Joint,
    pub side: Side,
    pub angle: f32,
    pub severity: PostureSeverity,
    pub violated_bound: f32,
    pub safe_min: f32,
    pub safe_max: f32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoseAnalysis {
    pub keypoints: KeypointSet,
    pub joint_angles: Vec<JointAngle>,
    pub asymmetry: BTreeMap<Joint, f32>,
    pub fatigue_score: f32,
    pub pose_risk: f32,
    pub posture_alerts: Vec<PostureAlert>,
    pub issues: Vec<String>,
}

impl PoseAnalysis {
    /// Angle map keyed "joint_side", the shape the predictor consumes.
    pub fn angle_map(&self) -> BTreeMap<String, f32> {
        self.joint_angles
            .iter()
            .map(|a| (a.key().to_string(), a.angle))
            .collect()
    }

    pub fn has_danger_posture(&self) -> bool {
        self.posture_alerts
            .iter()
            .any(|a| a.severity == PostureSeverity::Danger)
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Angle at vertex `b` between segments b→a and b→c, in degrees [0, 180].
/// None when either segment has zero length or the inputs are not finite.
pub fn joint_angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> Option<f32> {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);

    let mag_ba = (ba.0 * ba.0 + ba.1 * ba.1).sqrt();
    let mag_bc = (bc.0 * bc.0 + bc.1 * bc.1).sqrt();
    if !(mag_ba > f32::EPSILON && mag_bc > f32::EPSILON) {
        return None;
    }

    let cos = (ba.0 * bc.0 + ba.1 * bc.1) / (mag_ba * mag_bc);
    if !cos.is_finite() {
        return None;
    }
    Some(cos.clamp(-1.0, 1.0).acos().to_degrees())
}

fn visible_point(keypoints: &KeypointSet, part: BodyPart, min_visibility: f32) -> Option<(f32, f32)> {
    keypoints
        .get(&part)
        .filter(|kp: &&Keypoint| kp.visibility >= min_visibility)
        .map(|kp| (kp.x, kp.y))
}

/// Every joint in JOINT_DEFINITIONS whose three points are present and
/// non-degenerate. Safety flags stay at their defaults; see `classify_against`.
pub fn compute_angles(keypoints: &KeypointSet, min_visibility: f32) -> Vec<JointAngle> {
    JOINT_DEFINITIONS
        .iter()
        .filter_map(|&(joint, side, pa, vertex, pc)| {
            let a = visible_point(keypoints, pa, min_visibility)?;
            let b = visible_point(keypoints, vertex, min_visibility)?;
            let c = visible_point(keypoints, pc, min_visibility)?;
            let angle = joint_angle(a, b, c)?;
            Some(JointAngle {
                joint,
                side,
                angle,
                is_safe: true,
                threshold_exceeded_by: 0.0,
            })
        })
        .collect()
}

/// |left − right| for joints measured on both sides this frame.
pub fn compute_asymmetry(angles: &[JointAngle]) -> BTreeMap<Joint, f32> {
    let mut left: BTreeMap<Joint, f32> = BTreeMap::new();
    let mut right: BTreeMap<Joint, f32> = BTreeMap::new();
    for a in angles {
        match a.side {
            Side::Left => {
                left.insert(a.joint, a.angle);
            }
            Side::Right => {
                right.insert(a.joint, a.angle);
            }
            Side::Center => {}
        }
    }

    left.into_iter()
        .filter_map(|(joint, l)| right.get(&joint).map(|r| (joint, (l - r).abs())))
        .collect()
}

// ============================================================================
// POSTURE
// ============================================================================

fn describe(side: Side, joint: Joint) -> String {
    match side {
        Side::Center => joint.as_str().to_string(),
        _ => format!("{} {}", side.as_str(), joint.as_str()),
    }
}

/// Sets safety flags on each angle and returns posture alerts.
///
/// Outside the safe band but within the danger band → warning. Strictly
/// beyond the danger band → danger.
pub fn classify_against(angles: &mut [JointAngle], profile: &SportProfile) -> Vec<PostureAlert> {
    let mut alerts = Vec::new();

    for a in angles.iter_mut() {
        let Some(range) = profile.angle_range(a.joint) else {
            continue;
        };

        if a.angle >= range.safe_min && a.angle <= range.safe_max {
            a.is_safe = true;
            a.threshold_exceeded_by = 0.0;
            continue;
        }

        let below = a.angle < range.safe_min;
        a.is_safe = false;
        a.threshold_exceeded_by = if below {
            range.safe_min - a.angle
        } else {
            a.angle - range.safe_max
        };

        let label = describe(a.side, a.joint);
        let alert = if a.angle < range.danger_min || a.angle > range.danger_max {
            let bound = if below { range.danger_min } else { range.danger_max };
            PostureAlert {
                joint: a.joint,
                side: a.side,
                angle: a.angle,
                severity: PostureSeverity::Danger,
                violated_bound: bound,
                safe_min: range.safe_min,
                safe_max: range.safe_max,
                message: format!("Dangerous {} angle: {:.1}° (limit {:.0}°)", label, a.angle, bound),
            }
        } else {
            let bound = if below { range.safe_min } else { range.safe_max };
            PostureAlert {
                joint: a.joint,
                side: a.side,
                angle: a.angle,
                severity: PostureSeverity::Warning,
                violated_bound: bound,
                safe_min: range.safe_min,
                safe_max: range.safe_max,
                message: format!(
                    "Abnormal {} angle: {:.1}° (safe {:.0}-{:.0}°)",
                    label, a.angle, range.safe_min, range.safe_max
                ),
            }
        };
        alerts.push(alert);
    }

    alerts
}

/// Additive pose risk, clamped to [0, 100]. Appends one issue per penalty.
pub fn pose_risk(
    angles: &[JointAngle],
    asymmetry: &BTreeMap<Joint, f32>,
    fatigue: f32,
    issues: &mut Vec<String>,
) -> f32 {
    let mut risk = 0.0f32;

    for a in angles {
        match a.joint {
            Joint::Knee if a.angle < 40.0 => {
                risk += 25.0;
                issues.push(format!("Dangerous {} knee angle: {:.1}°", a.side.as_str(), a.angle));
            }
            Joint::Spine if a.angle < 120.0 => {
                risk += 30.0;
                issues.push(format!("Excessive spinal flexion: {:.1}°", a.angle));
            }
            Joint::Shoulder if a.angle > 170.0 => {
                risk += 20.0;
                issues.push(format!(
                    "Shoulder hyperextension ({}): {:.1}°",
                    a.side.as_str(),
                    a.angle
                ));
            }
            _ => {}
        }
    }

    for (joint, diff) in asymmetry {
        if *diff > 15.0 {
            risk += 10.0;
            issues.push(format!("High {} asymmetry: {:.1}° difference", joint.as_str(), diff));
        }
    }

    if fatigue > 50.0 {
        risk += fatigue * 0.2;
        issues.push(format!("Fatigue detected: {:.0}%", fatigue));
    }

    risk.clamp(0.0, 100.0)
}

// ============================================================================
// FATIGUE
// ============================================================================

pub struct FatigueTracker {
    baseline: Option<BTreeMap<JointKey, f32>>,
    history: VecDeque<(f64, BTreeMap<JointKey, f32>)>,
    window_seconds: f64,
    drift_threshold_deg: f32,
    min_samples: usize,
}

impl FatigueTracker {
    pub fn new(config: &BiomechanicsConfig) -> Self {
        Self {
            baseline: None,
            history: VecDeque::new(),
            window_seconds: config.fatigue_window_seconds,
            drift_threshold_deg: config.fatigue_drift_threshold_deg,
            min_samples: config.fatigue_min_samples,
        }
    }

    /// Record this frame's angles and return the fatigue score [0, 100].
    pub fn update(&mut self, angles: &[JointAngle], timestamp_s: f64) -> f32 {
        let current: BTreeMap<JointKey, f32> = angles.iter().map(|a| (a.key(), a.angle)).collect();

        if self.baseline.is_none() && !current.is_empty() {
            info!("🧍 Fatigue baseline captured ({} joints)", current.len());
            self.baseline = Some(current.clone());
        }

        // Timestamps never go backwards inside the window.
        let ts = match self.history.back() {
            Some((last, _)) if timestamp_s < *last => {
                debug!("Out-of-order frame timestamp {:.3} < {:.3}, clamping", timestamp_s, last);
                *last
            }
            _ => timestamp_s,
        };
        self.history.push_back((ts, current.clone()));
        self.prune(ts);

        if self.history.len() < self.min_samples {
            return 0.0;
        }

        let Some(baseline) = self.baseline.as_ref() else {
            return 0.0;
        };

        let drifts: Vec<f32> = baseline
            .iter()
            .filter_map(|(key, base)| current.get(key).map(|now| (now - base).abs()))
            .collect();
        if drifts.is_empty() || self.drift_threshold_deg <= 0.0 {
            return 0.0;
        }

        let avg_drift = drifts.iter().sum::<f32>() / drifts.len() as f32;
        (avg_drift / self.drift_threshold_deg * 100.0).clamp(0.0, 100.0)
    }

    fn prune(&mut self, now: f64) {
        let cutoff = now - self.window_seconds;
        while let Some((t, _)) = self.history.front() {
            if *t < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn baseline(&self) -> Option<&BTreeMap<JointKey, f32>> {
        self.baseline.as_ref()
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.baseline = None;
        self.history.clear();
    }
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct BiomechanicalTracker {
    fatigue: FatigueTracker,
    min_visibility: f32,
}

impl BiomechanicalTracker {
    pub fn new(config: &BiomechanicsConfig) -> Self {
        Self {
            fatigue: FatigueTracker::new(config),
            min_visibility: config.min_visibility,
        }
    }

    /// None when no pose was detected this frame. Rolling state is only
    /// touched when a pose is present.
    pub fn analyze(
        &mut self,
        keypoints: Option<&KeypointSet>,
        timestamp_s: f64,
        profile: &SportProfile,
    ) -> Option<PoseAnalysis> {
        let keypoints = keypoints?;

        let mut joint_angles = compute_angles(keypoints, self.min_visibility);
        let asymmetry = compute_asymmetry(&joint_angles);
        let fatigue_score = self.fatigue.update(&joint_angles, timestamp_s);
        let posture_alerts = classify_against(&mut joint_angles, profile);

        let mut issues = Vec::new();
        let pose_risk = pose_risk(&joint_angles, &asymmetry, fatigue_score, &mut issues);

        Some(PoseAnalysis {
            keypoints: keypoints.clone(),
            joint_angles,
            asymmetry,
            fatigue_score,
            pose_risk,
            posture_alerts,
            issues,
        })
    }

    pub fn fatigue(&self) -> &FatigueTracker {
        &self.fatigue
    }

    pub fn reset(&mut self) {
        self.fatigue.reset();
    }
}
