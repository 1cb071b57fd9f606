// src/types.rs

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub biomechanics: BiomechanicsConfig,
    pub facial: FacialConfig,
    pub kinematics: KinematicsConfig,
    pub predictor: PredictorConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Sports whose predictors are trained before the listener opens
    pub preload_sports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run face/object analysis every Nth admitted frame
    pub secondary_interval: u64,
    /// Streaming entry point admits every Nth received frame
    pub frame_skip: u64,
    /// Frames between periodic diagnostics lines
    pub diagnostics_every: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomechanicsConfig {
    pub fatigue_window_seconds: f64,
    pub fatigue_drift_threshold_deg: f32,
    pub fatigue_min_samples: usize,
    /// Keypoints below this visibility are treated as absent for angle math
    pub min_visibility: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacialConfig {
    pub redness_alert: f32,
    pub paleness_alert: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub pixels_per_meter: f32,
    pub frame_rate: f32,
    pub min_contour_area: f32,
    pub max_contour_area: f32,
    pub proximity_radius_px: f32,
    pub reference_speed_kmh: f32,
    pub speed_alert_kmh: f32,
    pub high_speed_note_kmh: f32,
    pub min_keypoint_visibility: f32,
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub synthetic_samples: usize,
    pub n_estimators: usize,
    pub forest_max_depth: usize,
    pub boosting_max_depth: usize,
    pub learning_rate: f32,
    pub random_seed: u64,
    pub impact_proximity_threshold_px: f32,
    pub immediate_probability: f32,
    pub short_term_probability: f32,
    pub short_term_fatigue: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub yellow_threshold: f32,
    pub red_threshold: f32,
    pub cooldown_seconds: f64,
    pub history_capacity: usize,
    pub history_default_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// POSE LANDMARKS
// ============================================================================

/// MediaPipe pose landmark names, in model index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl BodyPart {
    pub const ALL: [BodyPart; 33] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Landmark for a MediaPipe model index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Normalized landmark: x, y in [0, 1] of frame size, visibility in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

impl Keypoint {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }
}

/// One frame's pose. Ordered so iteration (and nearest-zone ties) is
/// deterministic.
pub type KeypointSet = BTreeMap<BodyPart, Keypoint>;

/// Face mesh points, normalized, indexed by mesh vertex id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarkSet {
    pub points: Vec<(f32, f32)>,
}

impl FaceLandmarkSet {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<(f32, f32)> {
        self.points.get(index).copied()
    }
}

/// Moving-region proposal from a motion/contour detector (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCandidate {
    pub x: f32,
    pub y: f32,
    pub area: f32,
}

// ============================================================================
// FRAME
// ============================================================================

/// Detections computed upstream (e.g. by a browser-side landmarker) and
/// shipped alongside the frame.
#[derive(Debug, Clone, Default)]
pub struct DetectionHints {
    pub keypoints: Option<KeypointSet>,
    pub face: Option<FaceLandmarkSet>,
    pub motion: Option<Vec<MotionCandidate>>,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp_s: f64,
    pub width: u32,
    pub height: u32,
    pub image: Option<RgbImage>,
    pub hints: DetectionHints,
}

impl Frame {
    /// Frame with no pixel data; detections come entirely from hints.
    pub fn from_hints(timestamp_s: f64, width: u32, height: u32, hints: DetectionHints) -> Self {
        Self {
            timestamp_s,
            width,
            height,
            image: None,
            hints,
        }
    }

    pub fn with_image(timestamp_s: f64, image: RgbImage, hints: DetectionHints) -> Self {
        let (width, height) = image.dimensions();
        Self {
            timestamp_s,
            width,
            height,
            image: Some(image),
            hints,
        }
    }
}
