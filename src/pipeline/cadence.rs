// src/pipeline/cadence.rs
//
// Frame cadence for one session. Every received frame is counted; the
// streaming path admits every `frame_skip`-th of them. Pose runs on every
// admitted frame, face/object analysis on the first admitted frame and then
// every `secondary_interval`-th.

use tracing::debug;

use crate::types::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceDecision {
    /// 1-based count of received frames, used as the kinematics clock
    pub received_index: u64,
    /// 1-based count of admitted frames
    pub admitted_index: u64,
    pub run_secondary: bool,
}

#[derive(Debug)]
pub struct CadenceScheduler {
    secondary_interval: u64,
    frame_skip: u64,
    received: u64,
    admitted: u64,
    skipped: u64,
    secondary_runs: u64,
}

impl CadenceScheduler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            secondary_interval: config.secondary_interval.max(1),
            frame_skip: config.frame_skip.max(1),
            received: 0,
            admitted: 0,
            skipped: 0,
            secondary_runs: 0,
        }
    }

    /// Count a received frame and apply the frame-skip gate.
    /// None means the frame is dropped.
    pub fn offer(&mut self) -> Option<CadenceDecision> {
        self.received += 1;
        if self.received % self.frame_skip != 0 {
            self.skipped += 1;
            debug!("Frame {} skipped (frame_skip={})", self.received, self.frame_skip);
            return None;
        }
        Some(self.admit_received())
    }

    /// Count a received frame and admit it unconditionally.
    pub fn admit(&mut self) -> CadenceDecision {
        self.received += 1;
        self.admit_received()
    }

    fn admit_received(&mut self) -> CadenceDecision {
        self.admitted += 1;
        let run_secondary = self.admitted == 1 || self.admitted % self.secondary_interval == 0;
        if run_secondary {
            self.secondary_runs += 1;
        }
        CadenceDecision {
            received_index: self.received,
            admitted_index: self.admitted,
            run_secondary,
        }
    }

    pub fn get_stats(&self) -> CadenceStats {
        CadenceStats {
            received: self.received,
            admitted: self.admitted,
            skipped: self.skipped,
            secondary_runs: self.secondary_runs,
        }
    }

    pub fn reset(&mut self) {
        self.received = 0;
        self.admitted = 0;
        self.skipped = 0;
        self.secondary_runs = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceStats {
    pub received: u64,
    pub admitted: u64,
    pub skipped: u64,
    pub secondary_runs: u64,
}
