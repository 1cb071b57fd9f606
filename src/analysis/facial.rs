// src/analysis/facial.rs
//
// Facial stress scoring from face mesh landmarks plus cheek pixel samples.
// All distances are divided by the nose bridge length so the thresholds hold
// regardless of distance to camera.

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{FaceLandmarkSet, FacialConfig};

// Face mesh vertex ids
const LEFT_BROW_TOP: usize = 70;
const LEFT_BROW_BOTTOM: usize = 63;
const RIGHT_BROW_TOP: usize = 300;
const RIGHT_BROW_BOTTOM: usize = 293;
const LEFT_EYE_TOP: usize = 159;
const LEFT_EYE_BOTTOM: usize = 145;
const RIGHT_EYE_TOP: usize = 386;
const RIGHT_EYE_BOTTOM: usize = 374;
const MOUTH_TOP: usize = 13;
const MOUTH_BOTTOM: usize = 14;
const MOUTH_LEFT: usize = 61;
const MOUTH_RIGHT: usize = 291;
const NOSE_TIP: usize = 1;
const NOSE_BRIDGE: usize = 6;
const LEFT_CHEEK: [usize; 4] = [123, 147, 213, 192];
const RIGHT_CHEEK: [usize; 4] = [352, 376, 433, 416];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacialAnalysis {
    pub pain_score: f32,
    pub stress_score: f32,
    pub skin_redness: f32,
    pub skin_paleness: f32,
    pub overall_facial_stress: f32,
    pub face_detected: bool,
    pub indicators: Vec<String>,
}

impl FacialAnalysis {
    /// Explicit "no face" result, distinct from a calm detected face.
    pub fn not_detected() -> Self {
        Self::default()
    }
}

/// Landmarks converted to pixel space for one frame.
struct PixelFace<'a> {
    face: &'a FaceLandmarkSet,
    width: f32,
    height: f32,
}

impl PixelFace<'_> {
    fn point(&self, idx: usize) -> Option<(f32, f32)> {
        self.face.get(idx).map(|(x, y)| (x * self.width, y * self.height))
    }

    fn dist(&self, a: usize, b: usize) -> Option<f32> {
        let (ax, ay) = self.point(a)?;
        let (bx, by) = self.point(b)?;
        Some(((ax - bx).powi(2) + (ay - by).powi(2)).sqrt())
    }

    /// Scale reference, None when too short to normalize against
    fn reference(&self) -> Option<f32> {
        self.dist(NOSE_TIP, NOSE_BRIDGE).filter(|d| *d >= 1.0)
    }
}

pub struct FacialStressScorer {
    config: FacialConfig,
    baseline_rgb: Option<[f32; 3]>,
}

impl FacialStressScorer {
    pub fn new(config: &FacialConfig) -> Self {
        Self {
            config: config.clone(),
            baseline_rgb: None,
        }
    }

    /// Score one frame. `image` is optional: without pixels only the
    /// geometric signatures contribute and the skin baseline is left alone.
    pub fn analyze(
        &mut self,
        face: Option<&FaceLandmarkSet>,
        image: Option<&RgbImage>,
        width: u32,
        height: u32,
    ) -> FacialAnalysis {
        let Some(face) = face else {
            return FacialAnalysis::not_detected();
        };

        let px = PixelFace {
            face,
            width: width as f32,
            height: height as f32,
        };

        let mut indicators = Vec::new();
        let pain_score = Self::pain_score(&px, &mut indicators);
        let stress_score = Self::stress_score(&px, &mut indicators);
        let (skin_redness, skin_paleness) = match image {
            Some(img) => self.skin_deviation(&px, img, &mut indicators),
            None => (0.0, 0.0),
        };

        let skin_factor = ((skin_redness + skin_paleness) * 100.0).min(100.0);
        let overall = (pain_score * 0.4 + stress_score * 0.3 + skin_factor * 0.3).min(100.0);

        FacialAnalysis {
            pain_score,
            stress_score,
            skin_redness,
            skin_paleness,
            overall_facial_stress: overall,
            face_detected: true,
            indicators,
        }
    }

    fn pain_score(px: &PixelFace<'_>, indicators: &mut Vec<String>) -> f32 {
        let Some(reference) = px.reference() else {
            return 0.0;
        };
        let mut score = 0.0f32;

        if let (Some(l), Some(r)) = (
            px.dist(LEFT_BROW_TOP, LEFT_BROW_BOTTOM),
            px.dist(RIGHT_BROW_TOP, RIGHT_BROW_BOTTOM),
        ) {
            if (l + r) / 2.0 / reference < 0.25 {
                score += 35.0;
                indicators.push("Brow furrow detected".to_string());
            }
        }

        if let (Some(l), Some(r)) = (
            px.dist(LEFT_EYE_TOP, LEFT_EYE_BOTTOM),
            px.dist(RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM),
        ) {
            if (l + r) / 2.0 / reference < 0.08 {
                score += 35.0;
                indicators.push("Eye squeeze detected (pain indicator)".to_string());
            }
        }

        if let (Some(v), Some(h)) = (px.dist(MOUTH_TOP, MOUTH_BOTTOM), px.dist(MOUTH_LEFT, MOUTH_RIGHT)) {
            if v / reference < 0.05 && h / reference > 0.4 {
                score += 30.0;
                indicators.push("Mouth compression detected".to_string());
            }
        }

        score.min(100.0)
    }

    fn stress_score(px: &PixelFace<'_>, indicators: &mut Vec<String>) -> f32 {
        let Some(reference) = px.reference() else {
            return 0.0;
        };
        let mut score = 0.0f32;

        if let Some(width) = px.dist(MOUTH_LEFT, MOUTH_RIGHT) {
            if width / reference > 0.6 {
                score += 40.0;
                indicators.push("Jaw tension / grimace detected".to_string());
            }
        }

        if let (Some(l), Some(r)) = (
            px.dist(LEFT_BROW_TOP, LEFT_BROW_BOTTOM),
            px.dist(RIGHT_BROW_TOP, RIGHT_BROW_BOTTOM),
        ) {
            if (l - r).abs() / reference > 0.1 {
                score += 30.0;
                indicators.push("Brow asymmetry (stress indicator)".to_string());
            }
        }

        if let (Some(l), Some(r)) = (
            px.dist(LEFT_EYE_TOP, LEFT_EYE_BOTTOM),
            px.dist(RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM),
        ) {
            if (l / reference - r / reference).abs() > 0.04 {
                score += 30.0;
                indicators.push("Eye asymmetry detected".to_string());
            }
        }

        score.min(100.0)
    }

    /// Mean RGB over the landmarks of one cheek, clamped to the image.
    fn cheek_color(px: &PixelFace<'_>, image: &RgbImage, cheek: &[usize]) -> Option<[f32; 3]> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let mut sum = [0.0f32; 3];
        let mut n = 0usize;
        for &idx in cheek {
            let Some((x, y)) = px.point(idx) else {
                continue;
            };
            let xi = (x.max(0.0) as u32).min(w - 1);
            let yi = (y.max(0.0) as u32).min(h - 1);
            let p = image.get_pixel(xi, yi);
            for c in 0..3 {
                sum[c] += p[c] as f32;
            }
            n += 1;
        }
        (n > 0).then(|| sum.map(|s| s / n as f32))
    }

    fn skin_deviation(
        &mut self,
        px: &PixelFace<'_>,
        image: &RgbImage,
        indicators: &mut Vec<String>,
    ) -> (f32, f32) {
        let cheeks: Vec<[f32; 3]> = [&LEFT_CHEEK[..], &RIGHT_CHEEK[..]]
            .into_iter()
            .filter_map(|c| Self::cheek_color(px, image, c))
            .collect();
        if cheeks.is_empty() {
            return (0.0, 0.0);
        }

        let mut avg = [0.0f32; 3];
        for c in &cheeks {
            for i in 0..3 {
                avg[i] += c[i] / cheeks.len() as f32;
            }
        }

        let Some(baseline) = self.baseline_rgb else {
            info!(
                "🙂 Skin baseline captured: rgb({:.0}, {:.0}, {:.0})",
                avg[0], avg[1], avg[2]
            );
            self.baseline_rgb = Some(avg);
            return (0.0, 0.0);
        };

        let mut redness = 0.0;
        if baseline[0] > 0.0 {
            redness = ((avg[0] - baseline[0]) / baseline[0]).max(0.0);
            if redness > self.config.redness_alert {
                indicators.push(format!("Skin redness increase: {:.0}%", redness * 100.0));
            }
        }

        let mut paleness = 0.0;
        let brightness = (avg[0] + avg[1] + avg[2]) / 3.0;
        let base_brightness = (baseline[0] + baseline[1] + baseline[2]) / 3.0;
        if base_brightness > 0.0 {
            paleness = ((base_brightness - brightness) / base_brightness).max(0.0);
            if paleness > self.config.paleness_alert {
                indicators.push(format!("Skin paleness detected: {:.0}%", paleness * 100.0));
            }
        }

        debug!("Skin deviation: redness={:.3} paleness={:.3}", redness, paleness);
        (redness, paleness)
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline_rgb.is_some()
    }

    pub fn reset(&mut self) {
        self.baseline_rgb = None;
    }
}
