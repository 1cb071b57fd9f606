// src/pipeline/mod.rs

pub mod cadence;
pub mod frame_context;
pub mod metrics;
pub mod secondary_cache;
pub mod session;

pub use cadence::{CadenceDecision, CadenceScheduler, CadenceStats};
pub use frame_context::{FrameAnalysis, FrameContext};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use secondary_cache::{CacheSlot, SecondaryCache};
pub use session::{MonitoringSession, SessionProviders};
