// src/pipeline/session.rs
//
// One monitored athlete. Owns every piece of rolling state (fatigue
// baseline, skin baseline, object history, alert history, cadence, cached
// secondary results) so concurrent sessions never share mutable state.
// Only the sport profiles and the trained predictors are shared.
//
// Per admitted frame: cadence → pose → (fresh or cached) face/object →
// prediction → alert fusion → posture escalation.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::cadence::{CadenceDecision, CadenceScheduler};
use super::frame_context::{merge_issues, FrameAnalysis, FrameContext};
use super::metrics::PipelineMetrics;
use super::secondary_cache::SecondaryCache;
use crate::analysis::alerts::apply_posture_escalation;
use crate::analysis::{
    Alert, AlertFusionEngine, AlertLevel, BiomechanicalTracker, FacialAnalysis, FacialStressScorer,
    KinematicImpactTracker, ObjectAnalysis, RiskInputs,
};
use crate::detectors::{
    FaceLandmarkProvider, HintFaceProvider, HintOrDiffMotion, HintPoseProvider, MotionDetector,
    PoseLandmarkProvider,
};
use crate::error::{Result, SentinelError};
use crate::prediction::{FeatureInputs, InjuryPredictor, PredictorRegistry};
use crate::profiles::Sport;
use crate::types::{Config, Frame};

/// External detectors feeding a session.
pub struct SessionProviders {
    pub pose: Box<dyn PoseLandmarkProvider>,
    pub face: Box<dyn FaceLandmarkProvider>,
    pub motion: Box<dyn MotionDetector>,
}

impl Default for SessionProviders {
    fn default() -> Self {
        Self {
            pose: Box::new(HintPoseProvider),
            face: Box::new(HintFaceProvider),
            motion: Box::new(HintOrDiffMotion::default()),
        }
    }
}

pub struct MonitoringSession {
    id: Uuid,
    sport: Sport,
    registry: Arc<PredictorRegistry>,
    metrics: PipelineMetrics,
    diagnostics_every: u64,

    scheduler: CadenceScheduler,
    cache: SecondaryCache,
    biomechanics: BiomechanicalTracker,
    facial: FacialStressScorer,
    kinematics: KinematicImpactTracker,
    alerts: AlertFusionEngine,
    providers: SessionProviders,

    /// Timestamp of the first admitted frame since the last reset
    started_at: Option<f64>,
}

impl MonitoringSession {
    pub fn new(config: &Config, registry: Arc<PredictorRegistry>, metrics: PipelineMetrics) -> Self {
        let id = Uuid::new_v4();
        metrics.inc(&metrics.active_sessions);
        info!("🏁 Session {} started", id);

        Self {
            id,
            sport: Sport::Generic,
            registry,
            metrics,
            diagnostics_every: config.pipeline.diagnostics_every,
            scheduler: CadenceScheduler::new(&config.pipeline),
            cache: SecondaryCache::default(),
            biomechanics: BiomechanicalTracker::new(&config.biomechanics),
            facial: FacialStressScorer::new(&config.facial),
            kinematics: KinematicImpactTracker::new(&config.kinematics),
            alerts: AlertFusionEngine::new(&config.alerts),
            providers: SessionProviders::default(),
            started_at: None,
        }
    }

    pub fn with_providers(mut self, providers: SessionProviders) -> Self {
        self.providers = providers;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sport(&self) -> Sport {
        self.sport
    }

    /// Switch the profile used for posture bands and prediction. Rolling
    /// state is kept.
    pub fn set_sport(&mut self, sport: Sport) {
        if sport != self.sport {
            info!("🏅 Session {} sport: {} → {}", self.id, self.sport, sport);
            self.sport = sport;
        }
    }

    /// Analyze a frame unconditionally (request/response path).
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameAnalysis> {
        let predictor = self.registry.acquire(self.sport)?;
        self.process_frame_with(frame, &predictor)
    }

    /// Same as `process_frame` with a predictor the caller already acquired,
    /// so first-use training can happen outside any lock around the session.
    /// The session switches to the predictor's sport.
    pub fn process_frame_with(
        &mut self,
        frame: &Frame,
        predictor: &InjuryPredictor,
    ) -> Result<FrameAnalysis> {
        self.metrics.inc(&self.metrics.frames_received);
        self.check(frame)?;
        self.set_sport(predictor.sport());
        let decision = self.scheduler.admit();
        Ok(self.run(frame, decision, predictor))
    }

    /// Streaming path: the frame-skip gate applies, `Ok(None)` means the
    /// frame was dropped.
    pub fn offer_frame(&mut self, frame: &Frame) -> Result<Option<FrameAnalysis>> {
        self.metrics.inc(&self.metrics.frames_received);
        self.check(frame)?;
        let predictor = self.registry.acquire(self.sport)?;
        match self.scheduler.offer() {
            Some(decision) => Ok(Some(self.run(frame, decision, &predictor))),
            None => {
                self.metrics.inc(&self.metrics.frames_skipped);
                Ok(None)
            }
        }
    }

    /// Rejects frames before any rolling state is touched.
    fn check(&self, frame: &Frame) -> Result<()> {
        if frame.width == 0 || frame.height == 0 {
            self.metrics.inc(&self.metrics.frames_rejected);
            return Err(SentinelError::InvalidFrame(format!(
                "frame size {}x{}",
                frame.width, frame.height
            )));
        }
        if let Some(image) = &frame.image {
            if image.dimensions() != (frame.width, frame.height) {
                self.metrics.inc(&self.metrics.frames_rejected);
                return Err(SentinelError::InvalidFrame(format!(
                    "declared {}x{} but image is {}x{}",
                    frame.width,
                    frame.height,
                    image.width(),
                    image.height()
                )));
            }
        }
        Ok(())
    }

    fn run(
        &mut self,
        frame: &Frame,
        decision: CadenceDecision,
        predictor: &InjuryPredictor,
    ) -> FrameAnalysis {
        let t0 = Instant::now();
        let profile = self.sport.profile();
        self.metrics.inc(&self.metrics.frames_admitted);

        let started_at = *self.started_at.get_or_insert(frame.timestamp_s);
        let elapsed_minutes = ((frame.timestamp_s - started_at).max(0.0) / 60.0) as f32;

        // ═══════════════════════════════════════════════════════════════
        // 1. DETECTIONS
        // ═══════════════════════════════════════════════════════════════
        let ctx = FrameContext {
            decision,
            timestamp_s: frame.timestamp_s,
            width: frame.width,
            height: frame.height,
            keypoints: self.providers.pose.detect(frame),
            face: if decision.run_secondary {
                self.providers.face.detect(frame)
            } else {
                None
            },
            motion: if decision.run_secondary {
                self.providers.motion.detect(frame)
            } else {
                Vec::new()
            },
        };

        // ═══════════════════════════════════════════════════════════════
        // 2. POSE (every admitted frame)
        // ═══════════════════════════════════════════════════════════════
        let pose = self
            .biomechanics
            .analyze(ctx.keypoints.as_ref(), ctx.timestamp_s, profile);
        if ctx.has_pose() {
            self.metrics.inc(&self.metrics.frames_with_pose);
        }

        // ═══════════════════════════════════════════════════════════════
        // 3. FACE + OBJECT (cadence-gated, cached otherwise)
        // ═══════════════════════════════════════════════════════════════
        if decision.run_secondary {
            let facial = self
                .facial
                .analyze(ctx.face.as_ref(), frame.image.as_ref(), ctx.width, ctx.height);
            self.cache.facial.store(facial, decision.admitted_index);

            let object = self.kinematics.analyze(
                &ctx.motion,
                ctx.keypoints.as_ref(),
                decision.received_index,
                ctx.width,
                ctx.height,
            );
            self.cache.object.store(object, decision.admitted_index);
            self.metrics.inc(&self.metrics.secondary_runs);
        } else {
            debug!(
                "F{}: reusing secondary results from F{:?}",
                decision.admitted_index,
                self.cache.facial.updated_at()
            );
        }
        let facial = self.cache.facial.get_or(FacialAnalysis::not_detected());
        let object = self.cache.object.get_or(ObjectAnalysis::empty());

        // ═══════════════════════════════════════════════════════════════
        // 4. PREDICTION
        // ═══════════════════════════════════════════════════════════════
        let joint_angles = pose.as_ref().map(|p| p.angle_map()).unwrap_or_default();
        let (pose_risk, fatigue_score) = pose
            .as_ref()
            .map_or((0.0, 0.0), |p| (p.pose_risk, p.fatigue_score));

        let prediction = predictor.predict_from_inputs(&FeatureInputs {
            joint_angles: pose.as_ref().map(|_| &joint_angles),
            asymmetry: pose.as_ref().map(|p| &p.asymmetry),
            facial_stress: facial.overall_facial_stress,
            object_speed: object.speed_kmh(),
            closest_body_distance: object.closest_body_distance,
            fatigue_score,
            time_elapsed_minutes: elapsed_minutes,
        });

        let (skeleton_landmarks, asymmetry, posture_alerts, pose_issues) = match pose {
            Some(p) => (p.keypoints, p.asymmetry, p.posture_alerts, p.issues),
            None => Default::default(),
        };

        // ═══════════════════════════════════════════════════════════════
        // 5. FUSION + POSTURE ESCALATION
        // ═══════════════════════════════════════════════════════════════
        let all_issues: Vec<String> = [
            pose_issues.as_slice(),
            facial.indicators.as_slice(),
            object.issues.as_slice(),
            prediction.contributing_factors.as_slice(),
        ]
        .concat();

        let outcome = self.alerts.evaluate(
            RiskInputs {
                pose_risk,
                facial_stress: facial.overall_facial_stress,
                object_risk: object.impact_risk,
                injury_probability: prediction.injury_probability,
            },
            &prediction.injury_type,
            &all_issues,
            frame.timestamp_s,
        );
        let verdict = apply_posture_escalation(&outcome.alert, &posture_alerts);
        if verdict.escalated {
            self.metrics.inc(&self.metrics.posture_escalations);
            debug!(
                "F{}: posture escalation {} → {}",
                decision.admitted_index, outcome.alert.level, verdict.level
            );
        }
        self.metrics.record_level(verdict.level);

        let mut analysis = FrameAnalysis {
            frame_index: decision.admitted_index,
            timestamp: frame.timestamp_s,
            sport: self.sport,
            pose_risk,
            facial_stress: facial.overall_facial_stress,
            object_risk: object.impact_risk,
            injury_probability: prediction.injury_probability,
            injury_type: prediction.injury_type.clone(),
            time_horizon: prediction.time_horizon,
            alert_level: outcome.alert.level,
            alert_message: outcome.alert.message.clone(),
            escalated: false,
            alert_recorded: outcome.recorded,
            contributing_factors: outcome.alert.contributing_factors.clone(),
            recommended_action: outcome.alert.recommended_action.clone(),
            alert: outcome.alert,
            joint_angles,
            asymmetry,
            fatigue_score,
            skeleton_landmarks,
            face_detected: facial.face_detected,
            object_speed: object.speed_kmh(),
            issues: merge_issues([all_issues.as_slice()]),
            posture_alerts,
            secondary_fresh: decision.run_secondary,
        };
        analysis.apply_verdict(verdict);

        let elapsed_us = t0.elapsed().as_micros() as u64;
        self.metrics.set_timing(&self.metrics.last_frame_us, elapsed_us);

        // ═══════════════════════════════════════════════════════════════
        // 6. PERIODIC DIAGNOSTICS
        // ═══════════════════════════════════════════════════════════════
        if self.diagnostics_every > 0 && decision.admitted_index % self.diagnostics_every == 0 {
            let stats = self.scheduler.get_stats();
            info!(
                "📊 Session {} (F{}): sport={} | pose={} | level={} | composite={:.0} | fatigue={:.0} | objects={} | history={} | received={} skipped={} secondary={} | {}µs",
                self.id,
                decision.admitted_index,
                self.sport,
                if ctx.has_pose() { "yes" } else { "no" },
                analysis.alert_level,
                analysis.alert.risk_score,
                fatigue_score,
                object.objects_detected,
                self.alerts.history_len(),
                stats.received,
                stats.skipped,
                stats.secondary_runs,
                elapsed_us,
            );
        }

        analysis
    }

    /// Most recent recorded alerts, oldest first.
    pub fn alert_history(&self, limit: usize) -> Vec<Alert> {
        self.alerts.history(limit)
    }

    pub fn current_level(&self) -> AlertLevel {
        self.alerts.current_level()
    }

    pub fn frames_admitted(&self) -> u64 {
        self.scheduler.get_stats().admitted
    }

    /// Start over as a fresh monitoring session. Idempotent.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.cache.clear();
        self.biomechanics.reset();
        self.facial.reset();
        self.kinematics.reset();
        self.alerts.clear();
        self.providers.motion.reset();
        self.started_at = None;
        info!("🔄 Session {} reset", self.id);
    }
}

impl Drop for MonitoringSession {
    fn drop(&mut self) {
        self.metrics.dec(&self.metrics.active_sessions);
        info!(
            "🏁 Session {} closed after {} frames",
            self.id,
            self.scheduler.get_stats().admitted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::biomechanics::tests::{skeleton, SideAngles, NOMINAL};
    use crate::analysis::biomechanics::Joint;
    use crate::analysis::PostureSeverity;
    use crate::types::{BodyPart, DetectionHints, Keypoint, KeypointSet, MotionCandidate, PredictorConfig};

    fn session(config: &Config) -> MonitoringSession {
        let registry = Arc::new(PredictorRegistry::new(PredictorConfig::fast()));
        let mut s = MonitoringSession::new(config, registry, PipelineMetrics::new());
        s.set_sport(Sport::Football);
        s
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.predictor = PredictorConfig::fast();
        config
    }

    fn pose_frame(ts: f64, keypoints: KeypointSet) -> Frame {
        Frame::from_hints(
            ts,
            640,
            480,
            DetectionHints {
                keypoints: Some(keypoints),
                ..DetectionHints::default()
            },
        )
    }

    #[test]
    fn test_no_pose_is_risk_neutral() {
        let mut s = session(&config());
        let frame = Frame::from_hints(0.0, 640, 480, DetectionHints::default());
        let a = s.process_frame(&frame).unwrap();

        assert_eq!(a.pose_risk, 0.0);
        assert!(a.joint_angles.is_empty());
        assert!(a.posture_alerts.is_empty());
        assert!(!a.face_detected);
        assert!(a.secondary_fresh, "first frame runs every analysis");
    }

    #[test]
    fn test_dangerous_knee_forces_red() {
        let mut s = session(&config());
        let left = SideAngles { knee: 25.0, ..NOMINAL };
        let a = s.process_frame(&pose_frame(0.0, skeleton(left, NOMINAL))).unwrap();

        assert!(a
            .posture_alerts
            .iter()
            .any(|p| p.joint == Joint::Knee && p.severity == PostureSeverity::Danger));
        assert_eq!(a.alert_level, AlertLevel::Red);
        assert!(a.alert_message.contains("ABNORMAL POSTURE"));
    }

    #[test]
    fn test_secondary_results_are_reused_between_runs() {
        let mut s = session(&config());
        let mut keypoints = skeleton(NOMINAL, NOMINAL);
        keypoints.insert(BodyPart::Nose, Keypoint::new(0.5, 0.1, 1.0));

        let moving = |ts: f64, x: f32| {
            let mut f = pose_frame(ts, keypoints.clone());
            f.hints.motion = Some(vec![MotionCandidate { x, y: 48.0, area: 400.0 }]);
            f
        };

        let first = s.process_frame(&moving(0.0, 100.0)).unwrap();
        let second = s.process_frame(&moving(1.0 / 30.0, 400.0)).unwrap();
        let third = s.process_frame(&moving(2.0 / 30.0, 500.0)).unwrap();

        assert!(first.secondary_fresh);
        assert!(!second.secondary_fresh);
        assert!(third.secondary_fresh, "interval 3 reruns on admitted #3");
        assert_eq!(first.object_speed, second.object_speed, "cached value reused");
        assert!(third.object_speed > 0.0);
    }

    #[test]
    fn test_invalid_frame_leaves_state_untouched() {
        let mut s = session(&config());
        let bad = Frame::from_hints(0.0, 0, 480, DetectionHints::default());
        assert!(matches!(s.process_frame(&bad), Err(SentinelError::InvalidFrame(_))));
        assert_eq!(s.frames_admitted(), 0);

        let ok = s.process_frame(&pose_frame(0.0, skeleton(NOMINAL, NOMINAL))).unwrap();
        assert_eq!(ok.frame_index, 1);
    }

    #[test]
    fn test_frame_skip_on_streaming_path() {
        let mut cfg = config();
        cfg.pipeline.frame_skip = 2;
        let mut s = session(&cfg);
        let frame = pose_frame(0.0, skeleton(NOMINAL, NOMINAL));

        assert!(s.offer_frame(&frame).unwrap().is_none());
        let admitted = s.offer_frame(&frame).unwrap().expect("every 2nd frame admitted");
        assert_eq!(admitted.frame_index, 1);
    }

    #[test]
    fn test_reset_clears_history_and_cadence() {
        let mut s = session(&config());
        let left = SideAngles { knee: 25.0, ..NOMINAL };
        let frame = pose_frame(0.0, skeleton(left, NOMINAL));
        s.process_frame(&frame).unwrap();
        s.process_frame(&frame).unwrap();
        assert!(!s.alert_history(10).is_empty());

        s.reset();
        s.reset();
        assert!(s.alert_history(10).is_empty());
        assert_eq!(s.frames_admitted(), 0);
        assert!(s.process_frame(&frame).unwrap().secondary_fresh);
    }

    #[test]
    fn test_shared_predictor_matches_registry() {
        let cfg = config();
        let registry = Arc::new(PredictorRegistry::new(PredictorConfig::fast()));
        let mut a = MonitoringSession::new(&cfg, registry.clone(), PipelineMetrics::new());
        let mut b = MonitoringSession::new(&cfg, registry.clone(), PipelineMetrics::new());
        a.set_sport(Sport::Football);
        b.set_sport(Sport::Football);

        let frame = pose_frame(0.0, skeleton(NOMINAL, NOMINAL));
        let ra = a.process_frame(&frame).unwrap();
        let rb = b.process_frame(&frame).unwrap();

        assert_eq!(registry.trainings(), 1);
        assert_eq!(ra.injury_probability, rb.injury_probability);
    }

    struct FixedPose(KeypointSet);

    impl PoseLandmarkProvider for FixedPose {
        fn detect(&mut self, _frame: &Frame) -> Option<KeypointSet> {
            Some(self.0.clone())
        }
    }

    struct CountingMotion(Arc<std::sync::atomic::AtomicUsize>);

    impl MotionDetector for CountingMotion {
        fn detect(&mut self, _frame: &Frame) -> Vec<MotionCandidate> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Vec::new()
        }
    }

    #[test]
    fn test_custom_providers_replace_hints() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let left = SideAngles { knee: 25.0, ..NOMINAL };
        let mut s = session(&config()).with_providers(SessionProviders {
            pose: Box::new(FixedPose(skeleton(left, NOMINAL))),
            face: Box::new(HintFaceProvider),
            motion: Box::new(CountingMotion(calls.clone())),
        });

        // No hints at all: the pose comes from the provider.
        let bare = Frame::from_hints(0.0, 640, 480, DetectionHints::default());
        let first = s.process_frame(&bare).unwrap();
        assert!(first.posture_alerts.iter().any(|p| p.severity == PostureSeverity::Danger));
        assert_eq!(first.alert_level, AlertLevel::Red);

        for i in 1..6 {
            s.process_frame(&Frame::from_hints(i as f64, 640, 480, DetectionHints::default()))
                .unwrap();
        }
        // Secondary analyses on admitted frames 1, 3 and 6.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_process_with_acquired_predictor_follows_its_sport() {
        let cfg = config();
        let registry = Arc::new(PredictorRegistry::new(PredictorConfig::fast()));
        let mut s = MonitoringSession::new(&cfg, registry.clone(), PipelineMetrics::new());
        assert_eq!(s.sport(), Sport::Generic);

        let predictor = registry.acquire(Sport::Cricket).unwrap();
        let a = s
            .process_frame_with(&pose_frame(0.0, skeleton(NOMINAL, NOMINAL)), &predictor)
            .unwrap();
        assert_eq!(s.sport(), Sport::Cricket);
        assert_eq!(a.sport, Sport::Cricket);
        assert_eq!(registry.trainings(), 1);
    }
}
