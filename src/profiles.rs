// src/profiles.rs
//
// Per-sport risk profiles: joint angle bands, object speed thresholds and the
// injury catalog the predictor scores against. Static data, never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::biomechanics::Joint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Football,
    Cricket,
    Weightlifting,
    Generic,
}

impl Sport {
    pub const ALL: [Sport; 4] = [
        Self::Football,
        Self::Cricket,
        Self::Weightlifting,
        Self::Generic,
    ];

    /// Case-insensitive lookup; unknown sports fall back to `Generic`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "football" | "soccer" => Self::Football,
            "cricket" => Self::Cricket,
            "weightlifting" => Self::Weightlifting,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Football => "football",
            Self::Cricket => "cricket",
            Self::Weightlifting => "weightlifting",
            Self::Generic => "generic",
        }
    }

    pub fn profile(&self) -> &'static SportProfile {
        match self {
            Self::Football => &FOOTBALL,
            Self::Cricket => &CRICKET,
            Self::Weightlifting => &WEIGHTLIFTING,
            Self::Generic => &GENERIC,
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Angle bands in degrees. safe ⊂ warning ⊂ danger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleRange {
    pub joint: Joint,
    pub safe_min: f32,
    pub safe_max: f32,
    pub warning_min: f32,
    pub warning_max: f32,
    pub danger_min: f32,
    pub danger_max: f32,
}

/// Object speed thresholds, km/h
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedThreshold {
    pub safe_max: f32,
    pub warning_max: f32,
    pub danger_min: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InjuryType {
    pub name: &'static str,
    pub body_region: &'static str,
    pub primary_indicators: &'static [&'static str],
    pub risk_weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SportProfile {
    pub sport: Sport,
    pub display_name: &'static str,
    pub description: &'static str,
    pub injuries: &'static [InjuryType],
    pub angle_ranges: &'static [AngleRange],
    pub speed_threshold: SpeedThreshold,
    pub fatigue_weight: f32,
    pub facial_weight: f32,
    pub max_safe_asymmetry: f32,
}

impl SportProfile {
    pub fn angle_range(&self, joint: Joint) -> Option<&AngleRange> {
        self.angle_ranges.iter().find(|r| r.joint == joint)
    }

    pub fn summary(&self) -> SportSummary {
        SportSummary {
            sport: self.sport,
            display_name: self.display_name,
            description: self.description,
            injury_count: self.injuries.len(),
            injuries: self.injuries.iter().map(|i| i.name).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SportSummary {
    pub sport: Sport,
    pub display_name: &'static str,
    pub description: &'static str,
    pub injury_count: usize,
    pub injuries: Vec<&'static str>,
}

pub fn list_sports() -> Vec<SportSummary> {
    Sport::ALL.iter().map(|s| s.profile().summary()).collect()
}

const fn band(
    joint: Joint,
    safe: (f32, f32),
    warning: (f32, f32),
    danger: (f32, f32),
) -> AngleRange {
    AngleRange {
        joint,
        safe_min: safe.0,
        safe_max: safe.1,
        warning_min: warning.0,
        warning_max: warning.1,
        danger_min: danger.0,
        danger_max: danger.1,
    }
}

const fn injury(
    name: &'static str,
    body_region: &'static str,
    primary_indicators: &'static [&'static str],
    risk_weight: f32,
) -> InjuryType {
    InjuryType {
        name,
        body_region,
        primary_indicators,
        risk_weight,
    }
}

// ============================================================================
// PROFILES
// ============================================================================

pub static FOOTBALL: SportProfile = SportProfile {
    sport: Sport::Football,
    display_name: "Football / Soccer",
    description: "High-impact sport with running, tackling, and sudden direction changes",
    injuries: &[
        injury("ACL Tear", "knee", &["knee_angle", "asymmetry", "deceleration"], 1.5),
        injury("Ankle Sprain", "ankle", &["ankle_angle", "lateral_movement"], 1.2),
        injury("Hamstring Strain", "leg", &["hip_angle", "fatigue", "sprint_speed"], 1.3),
        injury("Concussion", "head", &["impact_zone_head", "ball_speed"], 2.0),
        injury("Groin Strain", "hip", &["hip_angle", "asymmetry"], 1.0),
    ],
    angle_ranges: &[
        band(Joint::Knee, (60.0, 170.0), (40.0, 175.0), (30.0, 180.0)),
        band(Joint::Hip, (80.0, 170.0), (60.0, 175.0), (45.0, 180.0)),
        band(Joint::Shoulder, (20.0, 160.0), (10.0, 170.0), (5.0, 175.0)),
        band(Joint::Spine, (140.0, 180.0), (120.0, 180.0), (100.0, 180.0)),
        band(Joint::Elbow, (30.0, 170.0), (20.0, 175.0), (10.0, 180.0)),
    ],
    speed_threshold: SpeedThreshold {
        safe_max: 80.0,
        warning_max: 110.0,
        danger_min: 120.0,
    },
    fatigue_weight: 0.7,
    facial_weight: 0.5,
    max_safe_asymmetry: 12.0,
};

pub static CRICKET: SportProfile = SportProfile {
    sport: Sport::Cricket,
    display_name: "Cricket",
    description: "Bowling, batting, and fielding with high ball speeds and repetitive stress",
    injuries: &[
        injury("Finger Fracture", "hand", &["impact_zone_arm", "ball_speed"], 1.3),
        injury("Wrist Injury", "wrist", &["wrist_angle", "ball_speed"], 1.2),
        injury("Shoulder Strain", "shoulder", &["shoulder_angle", "bowling_action"], 1.5),
        injury("Head Injury", "head", &["impact_zone_head", "ball_speed"], 2.0),
        injury("Lower Back Stress", "spine", &["spine_angle", "fatigue", "bowling_load"], 1.4),
        injury("Side Strain", "torso", &["rotation_speed", "asymmetry"], 1.1),
    ],
    angle_ranges: &[
        band(Joint::Knee, (50.0, 170.0), (35.0, 175.0), (25.0, 180.0)),
        band(Joint::Hip, (70.0, 170.0), (50.0, 175.0), (40.0, 180.0)),
        band(Joint::Shoulder, (10.0, 155.0), (5.0, 165.0), (0.0, 175.0)),
        band(Joint::Spine, (130.0, 180.0), (110.0, 180.0), (90.0, 180.0)),
        band(Joint::Elbow, (20.0, 165.0), (10.0, 175.0), (5.0, 180.0)),
    ],
    speed_threshold: SpeedThreshold {
        safe_max: 120.0,
        warning_max: 145.0,
        danger_min: 150.0,
    },
    fatigue_weight: 0.6,
    facial_weight: 0.4,
    max_safe_asymmetry: 15.0,
};

pub static WEIGHTLIFTING: SportProfile = SportProfile {
    sport: Sport::Weightlifting,
    display_name: "Weightlifting",
    description: "Heavy load movements requiring strict form; spine, shoulders, and knees at highest risk",
    injuries: &[
        injury("Spinal Disc Herniation", "spine", &["spine_angle", "load_rate", "fatigue"], 2.0),
        injury("Shoulder Impingement", "shoulder", &["shoulder_angle", "asymmetry"], 1.5),
        injury("Knee Valgus Injury", "knee", &["knee_angle", "asymmetry"], 1.4),
        injury("Wrist Strain", "wrist", &["wrist_angle", "load"], 1.0),
        injury("Bicep Tear", "arm", &["elbow_angle", "load_rate"], 1.3),
    ],
    angle_ranges: &[
        band(Joint::Knee, (70.0, 170.0), (55.0, 175.0), (40.0, 180.0)),
        band(Joint::Hip, (60.0, 170.0), (45.0, 175.0), (30.0, 180.0)),
        band(Joint::Shoulder, (30.0, 150.0), (15.0, 165.0), (5.0, 175.0)),
        band(Joint::Spine, (150.0, 180.0), (130.0, 180.0), (110.0, 180.0)),
        band(Joint::Elbow, (40.0, 170.0), (25.0, 175.0), (15.0, 180.0)),
    ],
    speed_threshold: SpeedThreshold {
        safe_max: 20.0,
        warning_max: 35.0,
        danger_min: 40.0,
    },
    fatigue_weight: 0.9,
    facial_weight: 0.7,
    max_safe_asymmetry: 8.0,
};

pub static GENERIC: SportProfile = SportProfile {
    sport: Sport::Generic,
    display_name: "Generic Sports",
    description: "General movement analysis for any sport",
    injuries: &[
        injury("Joint Overextension", "joint", &["any_angle_extreme"], 1.0),
        injury("Muscle Strain", "muscle", &["fatigue", "asymmetry"], 1.0),
        injury("Impact Injury", "body", &["object_speed", "proximity"], 1.2),
        injury("Fatigue Collapse", "general", &["fatigue", "facial_stress"], 1.1),
    ],
    angle_ranges: &[
        band(Joint::Knee, (50.0, 170.0), (35.0, 175.0), (25.0, 180.0)),
        band(Joint::Hip, (70.0, 170.0), (50.0, 175.0), (40.0, 180.0)),
        band(Joint::Shoulder, (15.0, 160.0), (5.0, 170.0), (0.0, 180.0)),
        band(Joint::Spine, (135.0, 180.0), (115.0, 180.0), (95.0, 180.0)),
        band(Joint::Elbow, (25.0, 170.0), (15.0, 175.0), (5.0, 180.0)),
    ],
    speed_threshold: SpeedThreshold {
        safe_max: 100.0,
        warning_max: 130.0,
        danger_min: 140.0,
    },
    fatigue_weight: 0.6,
    facial_weight: 0.5,
    max_safe_asymmetry: 12.0,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sport_falls_back_to_generic() {
        assert_eq!(Sport::parse("Curling"), Sport::Generic);
        assert_eq!(Sport::parse(" FOOTBALL "), Sport::Football);
    }

    #[test]
    fn test_bands_are_nested() {
        for sport in Sport::ALL {
            for r in sport.profile().angle_ranges {
                assert!(
                    r.danger_min <= r.warning_min
                        && r.warning_min <= r.safe_min
                        && r.safe_max <= r.warning_max
                        && r.warning_max <= r.danger_max,
                    "{} {:?} bands not nested",
                    sport,
                    r.joint
                );
            }
        }
    }

    #[test]
    fn test_list_sports_covers_catalogs() {
        let sports = list_sports();
        assert_eq!(sports.len(), 4);
        let football = sports.iter().find(|s| s.sport == Sport::Football).unwrap();
        assert_eq!(football.injury_count, 5);
        assert_eq!(football.injuries[0], "ACL Tear");
    }
}
