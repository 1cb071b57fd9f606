// src/api/dto.rs
//
// Wire shapes for the REST and WebSocket endpoints, and frame decoding.

use base64::Engine;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::analysis::Alert;
use crate::error::{Result, SentinelError};
use crate::pipeline::FrameAnalysis;
use crate::profiles::{Sport, SportSummary};
use crate::types::{DetectionHints, FaceLandmarkSet, Frame, KeypointSet, MotionCandidate};

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

/// One frame from the client. Pixels, client-side detections, or both.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default = "default_width")]
    pub frame_width: u32,
    #[serde(default = "default_height")]
    pub frame_height: u32,
    /// Seconds; server clock when absent
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub keypoints: Option<KeypointSet>,
    /// Normalized face mesh points in mesh index order
    #[serde(default)]
    pub face: Option<Vec<(f32, f32)>>,
    #[serde(default)]
    pub motion: Option<Vec<MotionCandidate>>,
}

impl FrameRequest {
    pub fn sport(&self) -> Option<Sport> {
        self.sport.as_deref().map(Sport::parse)
    }

    /// True when the message only carries a sport switch.
    pub fn is_control_only(&self) -> bool {
        self.image_base64.is_none()
            && self.keypoints.is_none()
            && self.face.is_none()
            && self.motion.is_none()
    }

    pub fn into_frame(self, now_s: f64) -> Result<Frame> {
        let timestamp = self.timestamp.unwrap_or(now_s);
        let hints = DetectionHints {
            keypoints: self.keypoints,
            face: self.face.map(FaceLandmarkSet::new),
            motion: self.motion,
        };
        match self.image_base64.as_deref() {
            Some(payload) => Ok(Frame::with_image(timestamp, decode_image(payload)?, hints)),
            None => Ok(Frame::from_hints(
                timestamp,
                self.frame_width,
                self.frame_height,
                hints,
            )),
        }
    }
}

/// Base64 image, optionally as a `data:image/...;base64,` URL.
pub fn decode_image(payload: &str) -> Result<RgbImage> {
    let encoded = payload.split_once(',').map_or(payload, |(_, data)| data).trim();
    if encoded.is_empty() {
        return Err(SentinelError::Decode("empty image payload".into()));
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}

pub fn wall_clock_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub trained_sports: Vec<Sport>,
}

#[derive(Debug, Serialize)]
pub struct SportsResponse {
    pub sports: Vec<SportSummary>,
}

#[derive(Debug, Serialize)]
pub struct AlertHistoryResponse {
    pub count: usize,
    pub alerts: Vec<Alert>,
}

/// Server → client WebSocket messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Analysis(Box<FrameAnalysis>),
    Error { code: &'static str, message: String },
}

impl StreamMessage {
    pub fn error(err: &SentinelError) -> Self {
        let code = match err {
            SentinelError::Decode(_) => "DECODE_ERROR",
            SentinelError::InvalidFrame(_) => "INVALID_FRAME",
            SentinelError::Training(_) => "TRAINING_ERROR",
            SentinelError::Config(_) => "CONFIG_ERROR",
        };
        Self::Error {
            code,
            message: err.to_string(),
        }
    }
}
