// src/detectors/mod.rs
//
// Seams for the landmark and motion detectors that run outside the core.
// Built-ins read detections the client already computed (frame hints);
// motion falls back to frame differencing when the client sends pixels only.

pub mod motion;

pub use motion::{FrameDifferenceDetector, GrayFrame};

use crate::types::{FaceLandmarkSet, Frame, KeypointSet, MotionCandidate};

pub trait PoseLandmarkProvider: Send {
    /// Normalized keypoints, or None when no person is visible.
    fn detect(&mut self, frame: &Frame) -> Option<KeypointSet>;
}

pub trait FaceLandmarkProvider: Send {
    fn detect(&mut self, frame: &Frame) -> Option<FaceLandmarkSet>;
}

pub trait MotionDetector: Send {
    /// Moving-region centroids in pixels, with area.
    fn detect(&mut self, frame: &Frame) -> Vec<MotionCandidate>;

    fn reset(&mut self) {}
}

#[derive(Debug, Default)]
pub struct HintPoseProvider;

impl PoseLandmarkProvider for HintPoseProvider {
    fn detect(&mut self, frame: &Frame) -> Option<KeypointSet> {
        frame.hints.keypoints.clone().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct HintFaceProvider;

impl FaceLandmarkProvider for HintFaceProvider {
    fn detect(&mut self, frame: &Frame) -> Option<FaceLandmarkSet> {
        frame.hints.face.clone().filter(|f| !f.points.is_empty())
    }
}

/// Client motion hints when present, else frame differencing on the pixels.
#[derive(Debug, Default)]
pub struct HintOrDiffMotion {
    diff: FrameDifferenceDetector,
}

impl HintOrDiffMotion {
    pub fn new(diff: FrameDifferenceDetector) -> Self {
        Self { diff }
    }
}

impl MotionDetector for HintOrDiffMotion {
    fn detect(&mut self, frame: &Frame) -> Vec<MotionCandidate> {
        match &frame.hints.motion {
            Some(hints) => hints.clone(),
            None => self.diff.detect(frame),
        }
    }

    fn reset(&mut self) {
        self.diff.reset();
    }
}
