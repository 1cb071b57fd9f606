// src/analysis/kinematics.rs
//
// Kinematic impact tracker. Picks one moving object per frame from the motion
// detector's candidates, derives speed/acceleration/direction from its
// centroid history and scores impact risk against the athlete's keypoints.
//
// History samples carry the admitted-frame index they were observed on, so
// speed stays correct when the secondary cadence skips frames between
// observations.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::types::{BodyPart, KeypointSet, KinematicsConfig, MotionCandidate};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyZone {
    None,
    Head,
    Torso,
    Arm,
    Leg,
}

impl BodyZone {
    pub fn of(part: BodyPart) -> Option<Self> {
        use BodyPart::*;
        match part {
            Nose | LeftEye | RightEye | LeftEar | RightEar => Some(Self::Head),
            LeftShoulder | RightShoulder | LeftHip | RightHip => Some(Self::Torso),
            LeftElbow | RightElbow | LeftWrist | RightWrist => Some(Self::Arm),
            LeftKnee | RightKnee | LeftAnkle | RightAnkle => Some(Self::Leg),
            _ => None,
        }
    }

    /// Severity multiplier, head highest
    pub fn weight(&self) -> f32 {
        match self {
            Self::Head => 1.5,
            Self::Torso => 1.0,
            Self::Arm => 0.7,
            Self::Leg => 0.8,
            Self::None => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Head => "head",
            Self::Torso => "torso",
            Self::Arm => "arm",
            Self::Leg => "leg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedObject {
    pub x: f32,
    pub y: f32,
    pub speed_kmh: f32,
    /// km/h per second
    pub acceleration: f32,
    /// Degrees, 0 = right, 90 = down
    pub direction: f32,
    pub area: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAnalysis {
    pub objects_detected: usize,
    pub primary_object: Option<TrackedObject>,
    pub impact_risk: f32,
    pub impact_zone: BodyZone,
    /// Pixels; infinite when nothing to measure against
    #[serde(serialize_with = "finite_or_null")]
    pub closest_body_distance: f32,
    pub speed_alert: bool,
    pub issues: Vec<String>,
}

fn finite_or_null<S: serde::Serializer>(v: &f32, s: S) -> Result<S::Ok, S::Error> {
    if v.is_finite() {
        s.serialize_f32(*v)
    } else {
        s.serialize_none()
    }
}

impl ObjectAnalysis {
    pub fn empty() -> Self {
        Self {
            objects_detected: 0,
            primary_object: None,
            impact_risk: 0.0,
            impact_zone: BodyZone::None,
            closest_body_distance: f32::INFINITY,
            speed_alert: false,
            issues: Vec::new(),
        }
    }

    pub fn speed_kmh(&self) -> f32 {
        self.primary_object.map(|o| o.speed_kmh).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PositionSample {
    x: f32,
    y: f32,
    frame_index: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub speed_kmh: f32,
    pub acceleration: f32,
    pub direction: f32,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct KinematicImpactTracker {
    config: KinematicsConfig,
    history: VecDeque<PositionSample>,
}

impl KinematicImpactTracker {
    pub fn new(config: &KinematicsConfig) -> Self {
        Self {
            config: config.clone(),
            history: VecDeque::with_capacity(config.history_capacity),
        }
    }

    /// Largest candidate inside the configured area band.
    pub fn select_primary(&self, candidates: &[MotionCandidate]) -> Option<MotionCandidate> {
        candidates
            .iter()
            .filter(|c| c.area >= self.config.min_contour_area && c.area <= self.config.max_contour_area)
            .fold(None, |best: Option<MotionCandidate>, c| match best {
                Some(b) if b.area >= c.area => Some(b),
                _ => Some(*c),
            })
    }

    pub fn analyze(
        &mut self,
        candidates: &[MotionCandidate],
        keypoints: Option<&KeypointSet>,
        frame_index: u64,
        frame_width: u32,
        frame_height: u32,
    ) -> ObjectAnalysis {
        let in_band = candidates
            .iter()
            .filter(|c| c.area >= self.config.min_contour_area && c.area <= self.config.max_contour_area)
            .count();

        let Some(primary) = self.select_primary(candidates) else {
            return ObjectAnalysis::empty();
        };

        self.push(PositionSample {
            x: primary.x,
            y: primary.y,
            frame_index,
        });
        let kin = self.kinematics();
        debug!(
            "Object @({:.0},{:.0}) speed={:.1}km/h accel={:.1} dir={:.0}°",
            primary.x, primary.y, kin.speed_kmh, kin.acceleration, kin.direction
        );

        let mut issues = Vec::new();
        let (impact_risk, impact_zone, closest_body_distance) = self.assess_impact(
            (primary.x, primary.y),
            kin.speed_kmh,
            keypoints,
            frame_width,
            frame_height,
            &mut issues,
        );

        ObjectAnalysis {
            objects_detected: in_band,
            primary_object: Some(TrackedObject {
                x: primary.x,
                y: primary.y,
                speed_kmh: kin.speed_kmh,
                acceleration: kin.acceleration,
                direction: kin.direction,
                area: primary.area,
            }),
            impact_risk,
            impact_zone,
            closest_body_distance,
            speed_alert: kin.speed_kmh > self.config.speed_alert_kmh,
            issues,
        }
    }

    fn push(&mut self, sample: PositionSample) {
        if self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Seconds between two samples, at least one frame apart.
    fn dt(&self, earlier: &PositionSample, later: &PositionSample) -> f32 {
        let gap = later.frame_index.saturating_sub(earlier.frame_index).max(1);
        gap as f32 / self.config.frame_rate
    }

    fn speed_between(&self, a: &PositionSample, b: &PositionSample) -> f32 {
        let disp = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        disp / self.config.pixels_per_meter / self.dt(a, b) * 3.6
    }

    /// Speed and direction from the last two samples, acceleration from the
    /// last three. Zero on cold start.
    pub fn kinematics(&self) -> Kinematics {
        let n = self.history.len();
        if n < 2 {
            return Kinematics::default();
        }
        let p1 = &self.history[n - 2];
        let p2 = &self.history[n - 1];

        let speed_kmh = self.speed_between(p1, p2);
        let direction = (p2.y - p1.y).atan2(p2.x - p1.x).to_degrees().rem_euclid(360.0);

        let acceleration = if n >= 3 {
            let prev_speed = self.speed_between(&self.history[n - 3], p1);
            (speed_kmh - prev_speed) / self.dt(p1, p2)
        } else {
            0.0
        };

        Kinematics {
            speed_kmh,
            acceleration,
            direction,
        }
    }

    fn assess_impact(
        &self,
        object: (f32, f32),
        speed_kmh: f32,
        keypoints: Option<&KeypointSet>,
        frame_width: u32,
        frame_height: u32,
        issues: &mut Vec<String>,
    ) -> (f32, BodyZone, f32) {
        let Some(keypoints) = keypoints else {
            return (0.0, BodyZone::None, f32::INFINITY);
        };

        let mut closest = f32::INFINITY;
        let mut zone = BodyZone::None;
        for (part, kp) in keypoints {
            if kp.visibility < self.config.min_keypoint_visibility {
                continue;
            }
            let Some(z) = BodyZone::of(*part) else {
                continue;
            };
            let px = kp.x * frame_width as f32;
            let py = kp.y * frame_height as f32;
            let d = ((object.0 - px).powi(2) + (object.1 - py).powi(2)).sqrt();
            if d < closest {
                closest = d;
                zone = z;
            }
        }

        if zone == BodyZone::None {
            return (0.0, BodyZone::None, f32::INFINITY);
        }

        let proximity = (1.0 - closest / self.config.proximity_radius_px).max(0.0);
        let speed_factor = (speed_kmh / self.config.reference_speed_kmh).min(1.0);
        let risk = (proximity * speed_factor * zone.weight() * 100.0).min(100.0);

        if risk > 50.0 {
            issues.push(format!(
                "Object at {:.0} km/h approaching {} (dist: {:.0}px)",
                speed_kmh,
                zone.as_str(),
                closest
            ));
        }
        if speed_kmh > self.config.high_speed_note_kmh {
            issues.push(format!("Extreme object speed: {:.0} km/h", speed_kmh));
        }

        (risk, zone, closest)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn candidate(x: f32, y: f32, area: f32) -> MotionCandidate {
        MotionCandidate { x, y, area }
    }

    fn tracker() -> KinematicImpactTracker {
        KinematicImpactTracker::new(&KinematicsConfig::default())
    }

    #[test]
    fn test_no_candidates_is_empty_result() {
        let mut t = tracker();
        let result = t.analyze(&[], None, 0, 640, 480);
        assert_eq!(result.objects_detected, 0);
        assert_eq!(result.impact_risk, 0.0);
        assert_eq!(result.impact_zone, BodyZone::None);
        assert!(result.closest_body_distance.is_infinite());
        assert_eq!(t.history_len(), 0);
    }

    #[test]
    fn test_selects_largest_in_band() {
        let t = tracker();
        let picked = t
            .select_primary(&[
                candidate(10.0, 10.0, 50.0),
                candidate(20.0, 20.0, 800.0),
                candidate(30.0, 30.0, 9000.0),
                candidate(40.0, 40.0, 400.0),
            ])
            .unwrap();
        assert_eq!(picked.area, 800.0, "noise and background blobs are filtered");
        assert!(t.select_primary(&[candidate(0.0, 0.0, 99.0)]).is_none());
    }

    #[test]
    fn test_cold_start_zero_kinematics() {
        let mut t = tracker();
        let result = t.analyze(&[candidate(100.0, 100.0, 500.0)], None, 0, 640, 480);
        let obj = result.primary_object.unwrap();
        assert_eq!(obj.speed_kmh, 0.0);
        assert_eq!(obj.acceleration, 0.0);
        assert_eq!(obj.direction, 0.0);
    }

    #[test]
    fn test_speed_direction_and_acceleration() {
        let mut t = tracker();
        t.analyze(&[candidate(100.0, 100.0, 500.0)], None, 0, 640, 480);
        // 20px/frame at 200 px/m and 30 fps = 3 m/s = 10.8 km/h
        let r = t.analyze(&[candidate(100.0, 120.0, 500.0)], None, 1, 640, 480);
        let obj = r.primary_object.unwrap();
        assert!((obj.speed_kmh - 10.8).abs() < 1e-3);
        assert!((obj.direction - 90.0).abs() < 1e-3, "moving down the image");

        // doubled displacement: +10.8 km/h within 1/30 s
        let r = t.analyze(&[candidate(100.0, 160.0, 500.0)], None, 2, 640, 480);
        let obj = r.primary_object.unwrap();
        assert!((obj.speed_kmh - 21.6).abs() < 1e-3);
        assert!((obj.acceleration - 324.0).abs() < 0.05);
    }

    #[test]
    fn test_frame_gap_scales_speed() {
        let mut t = tracker();
        t.analyze(&[candidate(100.0, 100.0, 500.0)], None, 0, 640, 480);
        let r = t.analyze(&[candidate(160.0, 100.0, 500.0)], None, 3, 640, 480);
        // 60px over 3 frames is still 20 px/frame
        assert!((r.speed_kmh() - 10.8).abs() < 1e-3);
    }

    #[test]
    fn test_fast_ball_near_head() {
        let mut t = tracker();
        let mut kp = KeypointSet::new();
        kp.insert(BodyPart::Nose, Keypoint::new(340.74 / 640.0, 150.0 / 480.0, 0.9));
        kp.insert(BodyPart::LeftKnee, Keypoint::new(0.5, 0.9, 0.9));
        // invisible points are ignored even when closer
        kp.insert(BodyPart::LeftWrist, Keypoint::new(340.74 / 640.0, 100.0 / 480.0, 0.2));

        t.analyze(&[candidate(100.0, 100.0, 500.0)], Some(&kp), 0, 640, 480);
        let r = t.analyze(&[candidate(340.74, 100.0, 500.0)], Some(&kp), 1, 640, 480);

        assert!((r.speed_kmh() - 130.0).abs() < 0.05);
        assert_eq!(r.impact_zone, BodyZone::Head);
        assert!((r.closest_body_distance - 50.0).abs() < 0.01);
        assert!(r.impact_risk > 50.0, "risk {}", r.impact_risk);
        assert!(r.speed_alert);
        assert!(r.issues.iter().any(|i| i.contains("approaching head")));
        assert!(r.issues.iter().any(|i| i.contains("Extreme object speed")));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut t = tracker();
        for i in 0..50u64 {
            t.analyze(&[candidate(i as f32, 0.0, 500.0)], None, i, 640, 480);
        }
        assert_eq!(t.history_len(), 30);
    }

    #[test]
    fn test_reset_then_same_frame_twice_is_identical() {
        let mut t = tracker();
        let frames = [candidate(10.0, 10.0, 500.0), candidate(40.0, 50.0, 500.0)];
        t.analyze(&frames[..1], None, 0, 640, 480);
        t.analyze(&frames[1..], None, 1, 640, 480);

        t.reset();
        let first = t.analyze(&frames[1..], None, 7, 640, 480);
        t.reset();
        t.reset();
        let second = t.analyze(&frames[1..], None, 7, 640, 480);
        assert_eq!(first, second);
        assert_eq!(first.speed_kmh(), 0.0);
    }
}
