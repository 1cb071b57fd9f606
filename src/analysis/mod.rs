// src/analysis/mod.rs
//
// Per-modality analyzers.
//
// Signal flow:
//   KeypointSet      → biomechanics ─┐
//   FaceLandmarks+px → facial ───────┼→ prediction::InjuryPredictor → alerts::AlertFusionEngine
//   Motion centroids → kinematics ───┘
//
// Orchestrated per frame by pipeline::MonitoringSession.

pub mod alerts;
pub mod biomechanics;
pub mod facial;
pub mod kinematics;

pub use alerts::{
    apply_posture_escalation, Alert, AlertFusionEngine, AlertLevel, AlertOutcome, EffectiveVerdict,
    RiskInputs,
};
pub use biomechanics::{
    BiomechanicalTracker, Joint, JointAngle, PoseAnalysis, PostureAlert, PostureSeverity, Side,
};
pub use facial::{FacialAnalysis, FacialStressScorer};
pub use kinematics::{BodyZone, KinematicImpactTracker, ObjectAnalysis};
