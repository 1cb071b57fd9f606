// src/pipeline/frame_context.rs
//
// Everything one admitted frame produced. `FrameContext` collects the
// provider detections so every analyzer reads the same inputs;
// `FrameAnalysis` is the structured result handed back to the caller.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::analysis::biomechanics::{Joint, PostureAlert};
use crate::analysis::{Alert, AlertLevel, EffectiveVerdict};
use crate::prediction::TimeHorizon;
use crate::profiles::Sport;
use crate::types::{FaceLandmarkSet, KeypointSet, MotionCandidate};

use super::cadence::CadenceDecision;

pub const MAX_ISSUES: usize = 10;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub decision: CadenceDecision,
    pub timestamp_s: f64,
    pub width: u32,
    pub height: u32,
    pub keypoints: Option<KeypointSet>,
    /// Only populated when secondary analyses run this frame
    pub face: Option<FaceLandmarkSet>,
    pub motion: Vec<MotionCandidate>,
}

impl FrameContext {
    pub fn has_pose(&self) -> bool {
        self.keypoints.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalysis {
    pub frame_index: u64,
    pub timestamp: f64,
    pub sport: Sport,

    // Modality scores, 0–100
    pub pose_risk: f32,
    pub facial_stress: f32,
    pub object_risk: f32,
    pub injury_probability: f32,
    pub injury_type: String,
    pub time_horizon: TimeHorizon,

    // Verdict after posture escalation; `alert` keeps the fused base alert
    pub alert_level: AlertLevel,
    pub alert_message: String,
    pub escalated: bool,
    pub alert_recorded: bool,
    pub alert: Alert,
    pub contributing_factors: Vec<String>,
    pub recommended_action: String,

    // Measurements
    pub joint_angles: BTreeMap<String, f32>,
    pub asymmetry: BTreeMap<Joint, f32>,
    pub fatigue_score: f32,
    pub skeleton_landmarks: KeypointSet,
    pub face_detected: bool,
    pub object_speed: f32,

    pub issues: Vec<String>,
    pub posture_alerts: Vec<PostureAlert>,
    /// Face/object analyses ran on this frame rather than being reused
    pub secondary_fresh: bool,
}

impl FrameAnalysis {
    pub fn apply_verdict(&mut self, verdict: EffectiveVerdict) {
        self.alert_level = verdict.level;
        self.alert_message = verdict.message;
        self.escalated = verdict.escalated;
    }
}

/// Pose, face, object, then prediction issues, capped at `MAX_ISSUES`.
pub fn merge_issues<'a>(groups: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    groups
        .into_iter()
        .flat_map(|g| g.iter().cloned())
        .take(MAX_ISSUES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_issues_keeps_order_and_caps() {
        let pose: Vec<String> = (0..4).map(|i| format!("pose {i}")).collect();
        let face = vec!["brow furrow".to_string()];
        let obj: Vec<String> = (0..8).map(|i| format!("obj {i}")).collect();

        let merged = merge_issues([pose.as_slice(), face.as_slice(), obj.as_slice()]);
        assert_eq!(merged.len(), MAX_ISSUES);
        assert_eq!(merged[0], "pose 0");
        assert_eq!(merged[4], "brow furrow");
        assert_eq!(merged[9], "obj 4");
    }
}
