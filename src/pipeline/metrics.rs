// src/pipeline/metrics.rs
//
// Process-wide pipeline counters. Cloning shares the same atomics, so every
// session and the API handlers report into one set. Exported via
// /api/metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::analysis::AlertLevel;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_received: Arc<AtomicU64>,
    pub frames_admitted: Arc<AtomicU64>,
    pub frames_skipped: Arc<AtomicU64>,
    pub frames_rejected: Arc<AtomicU64>,
    pub secondary_runs: Arc<AtomicU64>,
    pub frames_with_pose: Arc<AtomicU64>,
    pub alerts_green: Arc<AtomicU64>,
    pub alerts_yellow: Arc<AtomicU64>,
    pub alerts_red: Arc<AtomicU64>,
    pub posture_escalations: Arc<AtomicU64>,
    pub active_sessions: Arc<AtomicU64>,
    pub last_frame_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: Arc::new(AtomicU64::new(0)),
            frames_admitted: Arc::new(AtomicU64::new(0)),
            frames_skipped: Arc::new(AtomicU64::new(0)),
            frames_rejected: Arc::new(AtomicU64::new(0)),
            secondary_runs: Arc::new(AtomicU64::new(0)),
            frames_with_pose: Arc::new(AtomicU64::new(0)),
            alerts_green: Arc::new(AtomicU64::new(0)),
            alerts_yellow: Arc::new(AtomicU64::new(0)),
            alerts_red: Arc::new(AtomicU64::new(0)),
            posture_escalations: Arc::new(AtomicU64::new(0)),
            active_sessions: Arc::new(AtomicU64::new(0)),
            last_frame_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self, counter: &AtomicU64) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    /// Count an effective (post-escalation) alert level.
    pub fn record_level(&self, level: AlertLevel) {
        let counter = match level {
            AlertLevel::Green => &self.alerts_green,
            AlertLevel::Yellow => &self.alerts_yellow,
            AlertLevel::Red => &self.alerts_red,
        };
        self.inc(counter);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_admitted.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_admitted: self.frames_admitted.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            secondary_runs: self.secondary_runs.load(Ordering::Relaxed),
            frames_with_pose: self.frames_with_pose.load(Ordering::Relaxed),
            fps: self.fps(),
            alerts_green: self.alerts_green.load(Ordering::Relaxed),
            alerts_yellow: self.alerts_yellow.load(Ordering::Relaxed),
            alerts_red: self.alerts_red.load(Ordering::Relaxed),
            posture_escalations: self.posture_escalations.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            last_frame_us: self.last_frame_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_received: u64,
    pub frames_admitted: u64,
    pub frames_skipped: u64,
    pub frames_rejected: u64,
    pub secondary_runs: u64,
    pub frames_with_pose: u64,
    pub fps: f64,
    pub alerts_green: u64,
    pub alerts_yellow: u64,
    pub alerts_red: u64,
    pub posture_escalations: u64,
    pub active_sessions: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let handle = metrics.clone();
        handle.inc(&handle.frames_received);
        handle.record_level(AlertLevel::Red);
        metrics.set_timing(&metrics.last_frame_us, 1234);

        let s = metrics.summary();
        assert_eq!(s.frames_received, 1);
        assert_eq!(s.alerts_red, 1);
        assert_eq!(s.alerts_green, 0);
        assert_eq!(s.last_frame_us, 1234);
    }

    #[test]
    fn test_dec_saturates_at_zero() {
        let metrics = PipelineMetrics::new();
        metrics.dec(&metrics.active_sessions);
        assert_eq!(metrics.summary().active_sessions, 0);
        metrics.inc(&metrics.active_sessions);
        metrics.inc(&metrics.active_sessions);
        metrics.dec(&metrics.active_sessions);
        assert_eq!(metrics.summary().active_sessions, 1);
    }
}
