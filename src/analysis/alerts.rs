// src/analysis/alerts.rs
//
// Alert fusion: weighted composite of all modality scores → GREEN/YELLOW/RED,
// a bounded alert history with per-level cooldown, and the posture override
// applied on top of the base level.
//
// Cooldown only gates what is recorded. Every evaluation is returned to the
// caller, recorded or not. RED is always recorded.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

use crate::analysis::biomechanics::{PostureAlert, PostureSeverity};
use crate::types::AlertConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Green,
    Yellow,
    Red,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub risk_score: f32,
    pub message: String,
    pub injury_type: String,
    pub contributing_factors: Vec<String>,
    pub recommended_action: String,
    pub timestamp: f64,
}

/// Per-modality scores, each already in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskInputs {
    pub pose_risk: f32,
    pub facial_stress: f32,
    pub object_risk: f32,
    pub injury_probability: f32,
}

impl RiskInputs {
    pub fn composite(&self) -> f32 {
        (self.pose_risk * 0.30
            + self.facial_stress * 0.20
            + self.object_risk * 0.20
            + self.injury_probability * 0.30)
            .clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct AlertOutcome {
    pub alert: Alert,
    /// Appended to history (passed cooldown, or RED)
    pub recorded: bool,
}

/// Level and message after the posture override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveVerdict {
    pub level: AlertLevel,
    pub message: String,
    pub escalated: bool,
}

/// Any danger posture forces RED. Any posture alert at all lifts GREEN to
/// YELLOW. Never lowers the base level.
pub fn apply_posture_escalation(base: &Alert, posture: &[PostureAlert]) -> EffectiveVerdict {
    if let Some(danger) = posture.iter().find(|p| p.severity == PostureSeverity::Danger) {
        if base.level == AlertLevel::Red {
            return EffectiveVerdict {
                level: AlertLevel::Red,
                message: base.message.clone(),
                escalated: false,
            };
        }
        return EffectiveVerdict {
            level: AlertLevel::Red,
            message: format!("🔴 ABNORMAL POSTURE - {}", danger.message),
            escalated: true,
        };
    }
    if let (AlertLevel::Green, Some(first)) = (base.level, posture.first()) {
        return EffectiveVerdict {
            level: AlertLevel::Yellow,
            message: format!("🟡 POSTURE WARNING - {}", first.message),
            escalated: true,
        };
    }
    EffectiveVerdict {
        level: base.level,
        message: base.message.clone(),
        escalated: false,
    }
}

pub struct AlertFusionEngine {
    config: AlertConfig,
    history: VecDeque<Alert>,
    last_recorded_at: HashMap<AlertLevel, f64>,
    last_level: Option<AlertLevel>,
}

impl AlertFusionEngine {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            config: config.clone(),
            history: VecDeque::with_capacity(config.history_capacity),
            last_recorded_at: HashMap::new(),
            last_level: None,
        }
    }

    pub fn level_for(&self, score: f32) -> AlertLevel {
        if score >= self.config.red_threshold {
            AlertLevel::Red
        } else if score >= self.config.yellow_threshold {
            AlertLevel::Yellow
        } else {
            AlertLevel::Green
        }
    }

    /// Fuse the inputs into an alert at time `now` (seconds) and record it
    /// if cooldown allows.
    pub fn evaluate(
        &mut self,
        inputs: RiskInputs,
        injury_type: &str,
        issues: &[String],
        now: f64,
    ) -> AlertOutcome {
        let score = inputs.composite();
        let level = self.level_for(score);

        let alert = Alert {
            level,
            risk_score: score,
            message: message(level, score, injury_type),
            injury_type: injury_type.to_string(),
            contributing_factors: issues.iter().take(5).cloned().collect(),
            recommended_action: recommended_action(level, injury_type),
            timestamp: now,
        };

        if self.last_level != Some(level) {
            match level {
                AlertLevel::Red => warn!("🚨 Alert level → RED ({:.0}%, {})", score, injury_type),
                _ => info!("Alert level → {} ({:.0}%)", level, score),
            }
            self.last_level = Some(level);
        }

        // A clock that went backwards counts as elapsed.
        let cooled = self.last_recorded_at.get(&level).map_or(true, |last| {
            if now < *last {
                debug!("Alert timestamp {:.3} precedes last {} at {:.3}", now, level, last);
                return true;
            }
            now - last >= self.config.cooldown_seconds
        });
        let recorded = cooled || level == AlertLevel::Red;

        if recorded {
            if self.history.len() >= self.config.history_capacity.max(1) {
                self.history.pop_front();
            }
            self.history.push_back(alert.clone());
            self.last_recorded_at.insert(level, now);
        }

        AlertOutcome { alert, recorded }
    }

    /// Most recent `limit` recorded alerts, oldest first.
    pub fn history(&self, limit: usize) -> Vec<Alert> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn current_level(&self) -> AlertLevel {
        self.history.back().map(|a| a.level).unwrap_or(AlertLevel::Green)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_recorded_at.clear();
        self.last_level = None;
    }
}

fn message(level: AlertLevel, score: f32, injury_type: &str) -> String {
    match level {
        AlertLevel::Red => format!(
            "🔴 HIGH RISK - {} probability at {:.0}%. Immediate medical attention recommended.",
            injury_type, score
        ),
        AlertLevel::Yellow => format!(
            "🟡 CAUTION - Elevated {} risk ({:.0}%). Monitor closely, consider rest.",
            injury_type.to_lowercase(),
            score
        ),
        AlertLevel::Green => format!("🟢 SAFE - All indicators within normal range ({:.0}%).", score),
    }
}

fn recommended_action(level: AlertLevel, injury_type: &str) -> String {
    match level {
        AlertLevel::Red => format!(
            "Stop activity immediately. Medical team should evaluate for {}. Apply ice/immobilize if applicable.",
            injury_type
        ),
        AlertLevel::Yellow => format!(
            "Reduce intensity. Monitor {} risk factors. Consider substitution or rest period.",
            injury_type.to_lowercase()
        ),
        AlertLevel::Green => "Continue activity. Maintain current form and hydration.".to_string(),
    }
}
